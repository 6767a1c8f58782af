use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, violates_primary_key},
    models::{
        LEG_COLLECTION, MATCH_COLLECTION, MATCH_PLAYER_COLLECTION, MongoLegDocument,
        MongoMatchDocument, MongoMatchPlayersDocument, MongoPlayerDocument, MongoThrowDocument,
        MongoTurnDocument, PLAYER_COLLECTION, THROW_COLLECTION, TURN_COLLECTION, doc_id,
    },
};
use crate::dao::{
    models::{LegEntity, MatchEntity, MatchPlayerEntity, PlayerEntity, ThrowEntity, TurnEntity},
    score_store::{
        DART_INDEX_KEY, LEG_NUMBER_KEY, PLAYER_NAME_KEY, ScoreStore, THROW_ID_KEY,
        TURN_NUMBER_KEY,
    },
    storage::StorageResult,
};

/// Primary-key constraint reported for collections without a secondary unique index.
const PRIMARY_KEY: &str = "_id_";

#[derive(Clone)]
pub struct MongoScoreStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoScoreStore {
    /// Establish a connection to MongoDB and ensure the unique indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let indexes: [(&'static str, Document, &'static str); 4] = [
            (PLAYER_COLLECTION, doc! {"name": 1}, PLAYER_NAME_KEY),
            (
                LEG_COLLECTION,
                doc! {"match_id": 1, "leg_number": 1},
                LEG_NUMBER_KEY,
            ),
            (
                TURN_COLLECTION,
                doc! {"leg_id": 1, "turn_number": 1},
                TURN_NUMBER_KEY,
            ),
            (
                THROW_COLLECTION,
                doc! {"turn_id": 1, "dart_index": 1},
                DART_INDEX_KEY,
            ),
        ];

        let database = self.database().await;
        for (collection, keys, name) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(name.to_owned()))
                        .unique(Some(true))
                        .build(),
                )
                .build();
            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.database().await.collection::<T>(name)
    }

    async fn insert<D: Serialize + Send + Sync>(
        &self,
        collection: &'static str,
        id: Uuid,
        constraint: &'static str,
        document: D,
    ) -> MongoResult<()> {
        self.collection::<D>(collection)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::from_write(collection, id, constraint, source))?;
        Ok(())
    }

    async fn replace<D: Serialize + Send + Sync>(
        &self,
        collection: &'static str,
        id: Uuid,
        constraint: &'static str,
        document: D,
    ) -> MongoResult<()> {
        self.collection::<D>(collection)
            .await
            .replace_one(doc_id(id), &document)
            .await
            .map_err(|source| MongoDaoError::from_write(collection, id, constraint, source))?;
        Ok(())
    }

    async fn find_one<D, E>(
        &self,
        collection: &'static str,
        filter: Document,
        sort: Option<Document>,
    ) -> MongoResult<Option<E>>
    where
        D: DeserializeOwned + Send + Sync,
        E: TryFrom<D, Error = MongoDaoError>,
    {
        let handle = self.collection::<D>(collection).await;
        let mut action = handle.find_one(filter);
        if let Some(sort) = sort {
            action = action.sort(sort);
        }
        action
            .await
            .map_err(|source| MongoDaoError::Query { collection, source })?
            .map(E::try_from)
            .transpose()
    }

    async fn find_many<D, E>(
        &self,
        collection: &'static str,
        filter: Document,
        sort: Document,
    ) -> MongoResult<Vec<E>>
    where
        D: DeserializeOwned + Send + Sync,
        E: TryFrom<D, Error = MongoDaoError>,
    {
        let documents: Vec<D> = self
            .collection::<D>(collection)
            .await
            .find(filter)
            .sort(sort)
            .await
            .map_err(|source| MongoDaoError::Query { collection, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query { collection, source })?;

        documents.into_iter().map(E::try_from).collect()
    }

    async fn list_match_players(&self, match_id: Uuid) -> MongoResult<Vec<MatchPlayerEntity>> {
        let document = self
            .collection::<MongoMatchPlayersDocument>(MATCH_PLAYER_COLLECTION)
            .await
            .find_one(doc_id(match_id))
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: MATCH_PLAYER_COLLECTION,
                source,
            })?;

        let mut seats = match document {
            Some(document) => document.into_entities()?,
            None => Vec::new(),
        };
        seats.sort_by_key(|seat| seat.play_order);
        Ok(seats)
    }

    async fn replace_match_players(
        &self,
        match_id: Uuid,
        players: Vec<MatchPlayerEntity>,
    ) -> MongoResult<()> {
        let document = MongoMatchPlayersDocument::new(match_id, players);
        self.collection::<MongoMatchPlayersDocument>(MATCH_PLAYER_COLLECTION)
            .await
            .replace_one(doc_id(match_id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: MATCH_PLAYER_COLLECTION,
                id: match_id,
                source,
            })?;
        Ok(())
    }

    async fn update_turn_score(
        &self,
        turn_id: Uuid,
        total_scored: u32,
        busted: bool,
    ) -> MongoResult<()> {
        self.collection::<Document>(TURN_COLLECTION)
            .await
            .update_one(
                doc_id(turn_id),
                doc! {"$set": {"total_scored": i64::from(total_scored), "busted": busted}},
            )
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: TURN_COLLECTION,
                id: turn_id,
                source,
            })?;
        Ok(())
    }

    async fn insert_throw(&self, throw: ThrowEntity) -> MongoResult<()> {
        let id = throw.id;
        let document = MongoThrowDocument::from(throw);
        match self
            .collection::<MongoThrowDocument>(THROW_COLLECTION)
            .await
            .insert_one(&document)
            .await
        {
            Ok(_) => Ok(()),
            Err(source) => {
                let constraint = if violates_primary_key(&source) {
                    THROW_ID_KEY
                } else {
                    DART_INDEX_KEY
                };
                Err(MongoDaoError::from_write(
                    THROW_COLLECTION,
                    id,
                    constraint,
                    source,
                ))
            }
        }
    }

    async fn list_throws(&self, turn_ids: Vec<Uuid>) -> MongoResult<Vec<ThrowEntity>> {
        let turn_ids: Vec<String> = turn_ids.iter().map(Uuid::to_string).collect();
        self.find_many::<MongoThrowDocument, ThrowEntity>(
            THROW_COLLECTION,
            doc! {"turn_id": {"$in": turn_ids}},
            doc! {"dart_index": 1},
        )
        .await
    }

    async fn delete_throw(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .collection::<Document>(THROW_COLLECTION)
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: THROW_COLLECTION,
                id,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }
}

impl ScoreStore for MongoScoreStore {
    fn insert_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = entity.id;
            store
                .insert(
                    MATCH_COLLECTION,
                    id,
                    PRIMARY_KEY,
                    MongoMatchDocument::from(entity),
                )
                .await
                .map_err(Into::into)
        })
    }

    fn update_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = entity.id;
            store
                .replace(
                    MATCH_COLLECTION,
                    id,
                    PRIMARY_KEY,
                    MongoMatchDocument::from(entity),
                )
                .await
                .map_err(Into::into)
        })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one::<MongoMatchDocument, _>(MATCH_COLLECTION, doc_id(id), None)
                .await
                .map_err(Into::into)
        })
    }

    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_many::<MongoMatchDocument, _>(
                    MATCH_COLLECTION,
                    doc! {},
                    doc! {"created_at": 1},
                )
                .await
                .map_err(Into::into)
        })
    }

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = player.id;
            store
                .insert(
                    PLAYER_COLLECTION,
                    id,
                    PLAYER_NAME_KEY,
                    MongoPlayerDocument::from(player),
                )
                .await
                .map_err(Into::into)
        })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one::<MongoPlayerDocument, _>(PLAYER_COLLECTION, doc_id(id), None)
                .await
                .map_err(Into::into)
        })
    }

    fn find_player_by_name(
        &self,
        name: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one::<MongoPlayerDocument, _>(PLAYER_COLLECTION, doc! {"name": name}, None)
                .await
                .map_err(Into::into)
        })
    }

    fn list_match_players(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchPlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_match_players(match_id).await.map_err(Into::into) })
    }

    fn replace_match_players(
        &self,
        match_id: Uuid,
        players: Vec<MatchPlayerEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .replace_match_players(match_id, players)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_leg(&self, leg: LegEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = leg.id;
            store
                .insert(
                    LEG_COLLECTION,
                    id,
                    LEG_NUMBER_KEY,
                    MongoLegDocument::from(leg),
                )
                .await
                .map_err(Into::into)
        })
    }

    fn update_leg(&self, leg: LegEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = leg.id;
            store
                .replace(
                    LEG_COLLECTION,
                    id,
                    LEG_NUMBER_KEY,
                    MongoLegDocument::from(leg),
                )
                .await
                .map_err(Into::into)
        })
    }

    fn find_leg(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<LegEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one::<MongoLegDocument, _>(LEG_COLLECTION, doc_id(id), None)
                .await
                .map_err(Into::into)
        })
    }

    fn list_legs(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<LegEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_many::<MongoLegDocument, _>(
                    LEG_COLLECTION,
                    doc! {"match_id": match_id.to_string()},
                    doc! {"leg_number": 1},
                )
                .await
                .map_err(Into::into)
        })
    }

    fn insert_turn(&self, turn: TurnEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = turn.id;
            store
                .insert(
                    TURN_COLLECTION,
                    id,
                    TURN_NUMBER_KEY,
                    MongoTurnDocument::from(turn),
                )
                .await
                .map_err(Into::into)
        })
    }

    fn find_turn(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TurnEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one::<MongoTurnDocument, _>(TURN_COLLECTION, doc_id(id), None)
                .await
                .map_err(Into::into)
        })
    }

    fn latest_turn(&self, leg_id: Uuid) -> BoxFuture<'static, StorageResult<Option<TurnEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one::<MongoTurnDocument, _>(
                    TURN_COLLECTION,
                    doc! {"leg_id": leg_id.to_string()},
                    Some(doc! {"turn_number": -1}),
                )
                .await
                .map_err(Into::into)
        })
    }

    fn list_turns(&self, leg_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<TurnEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_many::<MongoTurnDocument, _>(
                    TURN_COLLECTION,
                    doc! {"leg_id": leg_id.to_string()},
                    doc! {"turn_number": 1},
                )
                .await
                .map_err(Into::into)
        })
    }

    fn update_turn_score(
        &self,
        turn_id: Uuid,
        total_scored: u32,
        busted: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_turn_score(turn_id, total_scored, busted)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_throw(&self, throw: ThrowEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_throw(throw).await.map_err(Into::into) })
    }

    fn find_throw(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ThrowEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one::<MongoThrowDocument, _>(THROW_COLLECTION, doc_id(id), None)
                .await
                .map_err(Into::into)
        })
    }

    fn list_throws(
        &self,
        turn_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<ThrowEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_throws(turn_ids).await.map_err(Into::into) })
    }

    fn update_throw(&self, throw: ThrowEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = throw.id;
            store
                .replace(
                    THROW_COLLECTION,
                    id,
                    DART_INDEX_KEY,
                    MongoThrowDocument::from(throw),
                )
                .await
                .map_err(Into::into)
        })
    }

    fn delete_throw(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_throw(id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
