use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use futures_util::future::BoxFuture;
use tokio::io::{duplex, DuplexStream};

use crate::{
    bson::{doc, oid::ObjectId, Bson, Document},
    bson_util,
    cmap::{
        conn::wire::{
            DeleteFlags,
            InsertFlags,
            Message,
            MessageBody,
            MessageFlags,
            OpCode,
            OpDelete,
            OpInsert,
            OpMsg,
            OpReply,
            OpUpdate,
            UpdateFlags,
        },
        Connection,
        ConnectionPool,
        StreamConnection,
    },
    error::{ErrorKind, Result},
    options::ServerAddress,
};

const DUPLICATE_KEY: i32 = 11000;
const IMMUTABLE_FIELD: i32 = 66;
const COMMAND_NOT_FOUND: i32 = 59;

type WriteFailure = (i32, String);

/// A server that decodes the wire messages sent to it and applies the writes they carry to a
/// single in-memory collection with a unique index on `_id`.
///
/// Every connection made with [`FakeServer::connect`] shares the same collection and the same
/// record of what was received.
#[derive(Clone, Debug)]
pub(crate) struct FakeServer {
    address: ServerAddress,
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    documents: Vec<Document>,
    received: Vec<OpCode>,
    commands: Vec<Document>,
    last_error: Document,
    write_concern_error: bool,
    close_after: Option<usize>,
}

impl FakeServer {
    pub(crate) fn new(address: &str) -> Self {
        Self {
            address: ServerAddress::parse(address).unwrap(),
            state: Default::default(),
        }
    }

    /// Seeds the collection.
    pub(crate) fn with_documents(self, documents: Vec<Document>) -> Self {
        self.state.lock().unwrap().documents = documents;
        self
    }

    /// Reports a write concern timeout for every acknowledged write.
    pub(crate) fn with_write_concern_error(self) -> Self {
        self.state.lock().unwrap().write_concern_error = true;
        self
    }

    /// Closes each connection once it has handled `count` messages.
    pub(crate) fn close_after(self, count: usize) -> Self {
        self.state.lock().unwrap().close_after = Some(count);
        self
    }

    pub(crate) fn address(&self) -> &ServerAddress {
        &self.address
    }

    pub(crate) fn connect(&self) -> StreamConnection<DuplexStream> {
        let (client, server) = duplex(4 * 1024 * 1024);
        tokio::spawn(serve(self.state.clone(), server));
        StreamConnection::new(self.address.clone(), client)
    }

    /// The opcodes of every message received so far, in order.
    pub(crate) fn received_op_codes(&self) -> Vec<OpCode> {
        self.state.lock().unwrap().received.clone()
    }

    /// Yields to the server tasks until at least `count` messages have been received. Needed
    /// after writes the server does not answer.
    pub(crate) async fn wait_for_received(&self, count: usize) {
        for _ in 0..10_000 {
            if self.state.lock().unwrap().received.len() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!(
            "expected {count} messages, received {:?}",
            self.received_op_codes()
        );
    }

    /// Every command received so far, with document sequences folded in.
    pub(crate) fn commands(&self) -> Vec<Document> {
        self.state.lock().unwrap().commands.clone()
    }

    pub(crate) fn documents(&self) -> Vec<Document> {
        self.state.lock().unwrap().documents.clone()
    }

    /// The `_id`s of the documents in the collection, in insertion order.
    pub(crate) fn ids(&self) -> Vec<Bson> {
        self.documents()
            .iter()
            .filter_map(|document| document.get("_id").cloned())
            .collect()
    }
}

async fn serve(state: Arc<Mutex<State>>, mut stream: DuplexStream) {
    let mut handled = 0;
    loop {
        let Ok(message) = Message::read_from(&mut stream, None).await else {
            return;
        };

        let reply = {
            let mut state = state.lock().unwrap();
            if state.close_after == Some(handled) {
                return;
            }
            handled += 1;
            state.handle(message)
        };

        if let Some(reply) = reply {
            if reply.write_to(&mut stream).await.is_err() {
                return;
            }
        }
    }
}

impl State {
    fn handle(&mut self, message: Message) -> Option<Message> {
        self.received.push(message.op_code());
        let request_id = message.request_id();

        match message.body {
            MessageBody::Command(message) => {
                let reply = self.run_command(message.command_document());
                if message.flags.contains(MessageFlags::MORE_TO_COME) {
                    return None;
                }
                Some(Message::reply_to(
                    request_id,
                    MessageBody::Command(OpMsg::new(reply)),
                ))
            }
            MessageBody::Query(query) => {
                let reply = self.run_command(query.query);
                Some(Message::reply_to(
                    request_id,
                    MessageBody::Reply(OpReply::command_reply(reply)),
                ))
            }
            MessageBody::Insert(insert) => {
                self.last_error = self.legacy_insert(insert);
                None
            }
            MessageBody::Update(update) => {
                self.last_error = self.legacy_update(update);
                None
            }
            MessageBody::Delete(delete) => {
                self.last_error = self.legacy_delete(delete);
                None
            }
            MessageBody::Reply(_) => None,
        }
    }

    fn run_command(&mut self, command: Document) -> Document {
        self.commands.push(command.clone());
        let name = bson_util::first_key(&command).unwrap_or_default().to_string();
        match name.as_str() {
            "insert" => self.insert_command(&command),
            "update" => self.update_command(&command),
            "delete" => self.delete_command(&command),
            "getlasterror" => self.get_last_error(),
            other => doc! {
                "ok": 0,
                "code": COMMAND_NOT_FOUND,
                "codeName": "CommandNotFound",
                "errmsg": format!("no such command: '{other}'"),
            },
        }
    }

    fn insert_command(&mut self, command: &Document) -> Document {
        let ordered = command.get_bool("ordered").unwrap_or(true);
        let mut n = 0;
        let mut write_errors = Vec::new();
        for (index, document) in entries(command, "documents").into_iter().enumerate() {
            match self.insert_one(document) {
                Ok(()) => n += 1,
                Err(failure) => {
                    write_errors.push(write_error(index, failure));
                    if ordered {
                        break;
                    }
                }
            }
        }
        self.write_reply(doc! { "n": n }, write_errors)
    }

    fn update_command(&mut self, command: &Document) -> Document {
        let ordered = command.get_bool("ordered").unwrap_or(true);
        let mut n = 0;
        let mut modified = 0;
        let mut upserted = Vec::new();
        let mut write_errors = Vec::new();
        for (index, update) in entries(command, "updates").into_iter().enumerate() {
            let result = self.update(
                update.get_document("q").cloned().unwrap_or_default(),
                update.get_document("u").cloned().unwrap_or_default(),
                update.get_bool("multi").unwrap_or(false),
                update.get_bool("upsert").unwrap_or(false),
            );
            match result {
                Ok(stats) => {
                    n += stats.matched;
                    modified += stats.modified;
                    if let Some(id) = stats.upserted {
                        n += 1;
                        upserted.push(Bson::Document(doc! { "index": index as i32, "_id": id }));
                    }
                }
                Err(failure) => {
                    write_errors.push(write_error(index, failure));
                    if ordered {
                        break;
                    }
                }
            }
        }

        let mut reply = doc! { "n": n, "nModified": modified };
        if !upserted.is_empty() {
            reply.insert("upserted", upserted);
        }
        self.write_reply(reply, write_errors)
    }

    fn delete_command(&mut self, command: &Document) -> Document {
        let mut n = 0;
        for delete in entries(command, "deletes") {
            let filter = delete.get_document("q").cloned().unwrap_or_default();
            let multi = delete
                .get("limit")
                .and_then(bson_util::get_int)
                .unwrap_or(0)
                == 0;
            n += self.delete(&filter, multi);
        }
        self.write_reply(doc! { "n": n }, Vec::new())
    }

    fn write_reply(&self, mut reply: Document, write_errors: Vec<Bson>) -> Document {
        reply.insert("ok", 1);
        if !write_errors.is_empty() {
            reply.insert("writeErrors", write_errors);
        }
        if self.write_concern_error {
            reply.insert(
                "writeConcernError",
                doc! {
                    "code": 64,
                    "codeName": "WriteConcernFailed",
                    "errmsg": "waiting for replication timed out",
                    "errInfo": { "wtimeout": true },
                },
            );
        }
        reply
    }

    fn get_last_error(&self) -> Document {
        let mut reply = self.last_error.clone();
        reply.insert("ok", 1);
        if !reply.contains_key("err") {
            if self.write_concern_error {
                reply.insert("err", "waiting for replication timed out");
                reply.insert("wtimeout", true);
                reply.insert("code", 64);
            } else {
                reply.insert("err", Bson::Null);
            }
        }
        reply
    }

    fn legacy_insert(&mut self, insert: OpInsert) -> Document {
        let continue_on_error = insert.flags.contains(InsertFlags::CONTINUE_ON_ERROR);
        let mut last_error = doc! { "n": 0 };
        for document in insert.documents {
            if let Err(failure) = self.insert_one(document) {
                last_error = legacy_error(failure);
                if !continue_on_error {
                    break;
                }
            }
        }
        last_error
    }

    fn legacy_update(&mut self, update: OpUpdate) -> Document {
        let result = self.update(
            update.selector,
            update.update,
            update.flags.contains(UpdateFlags::MULTI_UPDATE),
            update.flags.contains(UpdateFlags::UPSERT),
        );
        match result {
            Ok(stats) => {
                let mut reply = doc! {
                    "n": stats.matched + i64::from(stats.upserted.is_some()),
                    "updatedExisting": stats.matched > 0,
                };
                if let Some(id) = stats.upserted {
                    reply.insert("upserted", id);
                }
                reply
            }
            Err(failure) => legacy_error(failure),
        }
    }

    fn legacy_delete(&mut self, delete: OpDelete) -> Document {
        let multi = !delete.flags.contains(DeleteFlags::SINGLE_REMOVE);
        doc! { "n": self.delete(&delete.selector, multi) }
    }

    fn insert_one(&mut self, document: Document) -> std::result::Result<(), WriteFailure> {
        let id = document.get("_id").cloned().unwrap_or(Bson::Null);
        if self
            .documents
            .iter()
            .any(|existing| existing.get("_id") == Some(&id))
        {
            return Err((
                DUPLICATE_KEY,
                format!("E11000 duplicate key error dup key: {{ _id: {id} }}"),
            ));
        }
        self.documents.push(document);
        Ok(())
    }

    fn update(
        &mut self,
        filter: Document,
        update: Document,
        multi: bool,
        upsert: bool,
    ) -> std::result::Result<UpdateStats, WriteFailure> {
        let mut targets: Vec<usize> = self
            .documents
            .iter()
            .enumerate()
            .filter(|(_, document)| matches(document, &filter))
            .map(|(index, _)| index)
            .collect();
        if !multi {
            targets.truncate(1);
        }

        if targets.is_empty() {
            if !upsert {
                return Ok(UpdateStats::default());
            }
            let seed: Document = filter
                .into_iter()
                .filter(|(key, _)| !key.starts_with('$'))
                .collect();
            let mut document = apply(&seed, &update)?;
            if !document.contains_key("_id") {
                let mut with_id = doc! { "_id": ObjectId::new() };
                with_id.extend(document);
                document = with_id;
            }
            let id = document.get("_id").cloned().unwrap_or(Bson::Null);
            self.insert_one(document)?;
            return Ok(UpdateStats {
                upserted: Some(id),
                ..Default::default()
            });
        }

        let mut stats = UpdateStats::default();
        for index in targets {
            let updated = apply(&self.documents[index], &update)?;
            stats.matched += 1;
            if updated != self.documents[index] {
                stats.modified += 1;
                self.documents[index] = updated;
            }
        }
        Ok(stats)
    }

    fn delete(&mut self, filter: &Document, multi: bool) -> i64 {
        let mut deleted = 0;
        self.documents.retain(|document| {
            if (multi || deleted == 0) && matches(document, filter) {
                deleted += 1;
                false
            } else {
                true
            }
        });
        deleted
    }
}

#[derive(Debug, Default)]
struct UpdateStats {
    matched: i64,
    modified: i64,
    upserted: Option<Bson>,
}

fn entries(command: &Document, key: &str) -> Vec<Document> {
    command
        .get_array(key)
        .map(|array| {
            array
                .iter()
                .filter_map(|entry| entry.as_document().cloned())
                .collect()
        })
        .unwrap_or_default()
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, value)| document.get(key) == Some(value))
}

/// Applies `$set`, `$inc` and `$unset` operators, or a replacement, to `document`. Neither may
/// change `_id`.
fn apply(document: &Document, update: &Document) -> std::result::Result<Document, WriteFailure> {
    let immutable_id = || {
        (
            IMMUTABLE_FIELD,
            "Performing an update on the path '_id' would modify the immutable field '_id'"
                .to_string(),
        )
    };

    let is_operator_update = bson_util::first_key(update)
        .map(|key| key.starts_with('$'))
        .unwrap_or(false);
    if !is_operator_update {
        if let (Some(old), Some(new)) = (document.get("_id"), update.get("_id")) {
            if old != new {
                return Err(immutable_id());
            }
        }
        let mut replaced = Document::new();
        if let Some(id) = document.get("_id") {
            replaced.insert("_id", id.clone());
        }
        replaced.extend(update.clone());
        return Ok(replaced);
    }

    let mut updated = document.clone();
    for (operator, fields) in update {
        let Some(fields) = fields.as_document() else {
            continue;
        };
        for (key, value) in fields {
            if key == "_id" && updated.contains_key("_id") {
                return Err(immutable_id());
            }
            match operator.as_str() {
                "$set" => {
                    updated.insert(key.clone(), value.clone());
                }
                "$inc" => {
                    let current = updated.get(key).and_then(bson_util::get_int).unwrap_or(0);
                    let increment = bson_util::get_int(value).unwrap_or(0);
                    updated.insert(key.clone(), current + increment);
                }
                "$unset" => {
                    updated.remove(key);
                }
                _ => {}
            }
        }
    }
    Ok(updated)
}

fn write_error(index: usize, (code, message): WriteFailure) -> Bson {
    Bson::Document(doc! { "index": index as i32, "code": code, "errmsg": message })
}

fn legacy_error((code, message): WriteFailure) -> Document {
    doc! { "n": 0, "err": message, "code": code }
}

/// A [`ConnectionPool`] handing out connections to a fixed set of [`FakeServer`]s.
#[derive(Clone, Debug, Default)]
pub(crate) struct FakeCluster {
    servers: HashMap<ServerAddress, FakeServer>,
    checked_out: Arc<Mutex<Vec<ServerAddress>>>,
}

impl FakeCluster {
    pub(crate) fn new(servers: impl IntoIterator<Item = FakeServer>) -> Self {
        Self {
            servers: servers
                .into_iter()
                .map(|server| (server.address().clone(), server))
                .collect(),
            checked_out: Default::default(),
        }
    }

    /// The addresses connections were checked out for, in order.
    pub(crate) fn checked_out(&self) -> Vec<ServerAddress> {
        self.checked_out.lock().unwrap().clone()
    }
}

impl ConnectionPool for FakeCluster {
    fn check_out<'a>(
        &'a self,
        address: &'a ServerAddress,
    ) -> BoxFuture<'a, Result<Box<dyn Connection>>> {
        Box::pin(async move {
            self.checked_out.lock().unwrap().push(address.clone());
            match self.servers.get(address) {
                Some(server) => Ok(Box::new(server.connect()) as Box<dyn Connection>),
                None => Err(ErrorKind::from(std::io::ErrorKind::ConnectionRefused).into()),
            }
        })
    }
}
