//! Domain library for the KYC registry contract.
//!
//! Holds the `User` record, the ports (traits) through which the host hands
//! world-state access to each invocation, and the error definitions. The
//! host owns consensus, ordering and durability; this crate only reads and
//! writes whole records through the `WorldState` capability it is given.

use serde::{Deserialize, Serialize};

/// A KYC record as persisted in world state.
///
/// Field names on the wire follow the contract's JSON layout (`firstName`,
/// `registrationId`, `bankerId`, ...). Missing fields decode as empty strings
/// so records written by earlier contract versions still load.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub gender: String,
    pub email: String,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    pub address: String,
    #[serde(rename = "registrationId")]
    pub registration_id: String,
    /// Hash of the uploaded KYC document. Empty until the first upload, then
    /// never replaced.
    #[serde(rename = "docHash")]
    pub doc_hash: String,
    /// Comma-joined banker identifiers allowed to see this record.
    #[serde(rename = "bankerId")]
    pub allowed_banker_ids: String,
}

impl User {
    pub fn has_document(&self) -> bool {
        !self.doc_hash.is_empty()
    }

    /// Banker identifiers in stored order, including empty segments.
    pub fn banker_ids(&self) -> impl Iterator<Item = &str> {
        self.allowed_banker_ids.split(',')
    }

    /// Mutable access to one of the free-text profile fields.
    pub fn field_mut(&mut self, field: UserField) -> &mut String {
        match field {
            UserField::FirstName => &mut self.first_name,
            UserField::LastName => &mut self.last_name,
            UserField::Gender => &mut self.gender,
            UserField::Email => &mut self.email,
            UserField::PhoneNumber => &mut self.phone_number,
            UserField::Address => &mut self.address,
        }
    }

    pub fn field(&self, field: UserField) -> &str {
        match field {
            UserField::FirstName => &self.first_name,
            UserField::LastName => &self.last_name,
            UserField::Gender => &self.gender,
            UserField::Email => &self.email,
            UserField::PhoneNumber => &self.phone_number,
            UserField::Address => &self.address,
        }
    }
}

/// Input data for creating a user record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
    /// Initial value of the authorized-banker list.
    pub banker_id: String,
}

/// Profile fields that may be replaced freely by a field update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UserField {
    FirstName,
    LastName,
    Gender,
    Email,
    PhoneNumber,
    Address,
}

impl UserField {
    pub const ALL: [UserField; 6] = [
        UserField::FirstName,
        UserField::LastName,
        UserField::Gender,
        UserField::Email,
        UserField::PhoneNumber,
        UserField::Address,
    ];

    /// Wire name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserField::FirstName => "firstName",
            UserField::LastName => "lastName",
            UserField::Gender => "gender",
            UserField::Email => "email",
            UserField::PhoneNumber => "phoneNumber",
            UserField::Address => "address",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        UserField::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

/// A (key, record) pair produced by listing; never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Record")]
    pub record: User,
}

/// Raw entry yielded by a world-state range scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

/// Failure reported by a world-state accessor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct StateError(pub String);

impl StateError {
    pub fn new<S: Into<String>>(msg: S) -> Self {
        Self(msg.into())
    }
}

/// Iteration handle over a key range. Holders must call `close` once done;
/// `registry::UserScan` does so on drop.
pub trait StateIterator {
    fn next_entry(&mut self) -> Option<Result<KeyValue, StateError>>;
    fn close(&mut self) -> Result<(), StateError>;
}

/// Key/value world-state capability supplied by the host per invocation.
pub trait WorldState: Send + Sync {
    /// Returns `None` when nothing is stored at `key`.
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateError>;
    /// Last write wins.
    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), StateError>;
    /// Deleting an absent key is not an error.
    fn del_state(&self, key: &str) -> Result<(), StateError>;
    /// Scan `[start, end)` in byte-wise key order. An empty `start` begins at
    /// the first key, an empty `end` runs to the last.
    fn get_state_by_range<'a>(
        &'a self,
        start: &str,
        end: &str,
    ) -> Result<Box<dyn StateIterator + 'a>, StateError>;
}

/// Per-invocation handle handed to every contract operation.
pub trait TransactionContext {
    fn tx_id(&self) -> &str;
    fn state(&self) -> &dyn WorldState;
}

/// Plain transaction context pairing an id with a borrowed world state.
pub struct Invocation<'a> {
    tx_id: String,
    state: &'a dyn WorldState,
}

impl<'a> Invocation<'a> {
    pub fn new<S: Into<String>>(tx_id: S, state: &'a dyn WorldState) -> Self {
        Self {
            tx_id: tx_id.into(),
            state,
        }
    }
}

impl TransactionContext for Invocation<'_> {
    fn tx_id(&self) -> &str {
        &self.tx_id
    }

    fn state(&self) -> &dyn WorldState {
        self.state
    }
}

/// Core domain errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0} does not exist")]
    NotFound(String),
    #[error("failed to read from world state: {0}")]
    StorageRead(StateError),
    #[error("failed to put to world state: {0}")]
    StorageWrite(StateError),
    #[error("document already uploaded for {0}")]
    AlreadySet(String),
    #[error("corrupt record at {key}: {reason}")]
    CorruptRecord { key: String, reason: String },
}

/// Return a short about/version line for host binaries to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{} - KYC registry contract", pkg, ver)
}

pub mod adapters;
pub mod record;
pub mod registry;
