use tracing::{debug, warn};

use crate::record::{decode, encode};
use crate::{
    CoreError, NewUser, QueryResult, StateIterator, TransactionContext, User, UserField,
};

/// Key prefix used by `init_ledger` for its sample records.
pub const SEED_KEY_PREFIX: &str = "USER";

/// Record store facade over the world state of one invocation.
///
/// Every operation takes the transaction context explicitly and performs a
/// whole-record read-modify-write. There is no version check: two concurrent
/// updates of different fields on the same key race, and the later commit
/// wins with its full copy of the record.
#[derive(Clone, Copy, Debug, Default)]
pub struct KycRegistry;

impl KycRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Write the sample users under `USER0`, `USER1`, ... Rerunning rewrites
    /// the same values.
    pub fn init_ledger<C: TransactionContext + ?Sized>(&self, ctx: &C) -> Result<(), CoreError> {
        for (i, user) in sample_users().iter().enumerate() {
            let key = format!("{SEED_KEY_PREFIX}{i}");
            self.write(ctx, &key, user)?;
        }
        debug!(tx_id = ctx.tx_id(), "ledger initialized");
        Ok(())
    }

    /// Store a new user under `id`, overwriting whatever was there.
    pub fn create_user<C: TransactionContext + ?Sized>(
        &self,
        ctx: &C,
        id: &str,
        input: NewUser,
    ) -> Result<User, CoreError> {
        let user = User {
            first_name: input.first_name,
            last_name: input.last_name,
            gender: input.gender,
            email: input.email,
            phone_number: input.phone_number,
            address: input.address,
            // Only seeded records carry a registration id.
            registration_id: String::new(),
            doc_hash: String::new(),
            allowed_banker_ids: input.banker_id,
        };
        self.write(ctx, id, &user)?;
        debug!(tx_id = ctx.tx_id(), key = id, "user created");
        Ok(user)
    }

    /// Load the user stored at `id`.
    pub fn query_user<C: TransactionContext + ?Sized>(
        &self,
        ctx: &C,
        id: &str,
    ) -> Result<User, CoreError> {
        let bytes = ctx
            .state()
            .get_state(id)
            .map_err(CoreError::StorageRead)?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        decode(id, &bytes)
    }

    /// Whether anything is stored at `id`. The value is not decoded.
    pub fn user_exists<C: TransactionContext + ?Sized>(
        &self,
        ctx: &C,
        id: &str,
    ) -> Result<bool, CoreError> {
        let bytes = ctx.state().get_state(id).map_err(CoreError::StorageRead)?;
        Ok(bytes.is_some())
    }

    /// Lazily walk the whole world state, decoding every value as a `User`.
    ///
    /// The scan is not limited to user keys: any other key in the namespace
    /// is returned too, and fails the scan if its value is not a JSON object.
    pub fn scan_users<'c, C: TransactionContext + ?Sized>(
        &self,
        ctx: &'c C,
    ) -> Result<UserScan<'c>, CoreError> {
        let iter = ctx
            .state()
            .get_state_by_range("", "")
            .map_err(CoreError::StorageRead)?;
        Ok(UserScan { iter: Some(iter) })
    }

    /// Collect every (key, user) pair in store order. Any read or decode
    /// error fails the whole call.
    pub fn query_all_users<C: TransactionContext + ?Sized>(
        &self,
        ctx: &C,
    ) -> Result<Vec<QueryResult>, CoreError> {
        let mut scan = self.scan_users(ctx)?;
        let mut results = Vec::new();
        for item in scan.by_ref() {
            results.push(item?);
        }
        scan.finish()?;
        debug!(tx_id = ctx.tx_id(), count = results.len(), "listed users");
        Ok(results)
    }

    /// Replace one profile field of the user at `id`.
    pub fn update_field<C: TransactionContext + ?Sized>(
        &self,
        ctx: &C,
        id: &str,
        field: UserField,
        value: &str,
    ) -> Result<User, CoreError> {
        let mut user = self.query_user(ctx, id)?;
        *user.field_mut(field) = value.to_string();
        self.write(ctx, id, &user)?;
        debug!(tx_id = ctx.tx_id(), key = id, field = field.as_str(), "user field updated");
        Ok(user)
    }

    pub fn change_user_first_name<C: TransactionContext + ?Sized>(
        &self,
        ctx: &C,
        id: &str,
        value: &str,
    ) -> Result<User, CoreError> {
        self.update_field(ctx, id, UserField::FirstName, value)
    }

    pub fn change_user_last_name<C: TransactionContext + ?Sized>(
        &self,
        ctx: &C,
        id: &str,
        value: &str,
    ) -> Result<User, CoreError> {
        self.update_field(ctx, id, UserField::LastName, value)
    }

    pub fn change_gender<C: TransactionContext + ?Sized>(
        &self,
        ctx: &C,
        id: &str,
        value: &str,
    ) -> Result<User, CoreError> {
        self.update_field(ctx, id, UserField::Gender, value)
    }

    pub fn change_user_email<C: TransactionContext + ?Sized>(
        &self,
        ctx: &C,
        id: &str,
        value: &str,
    ) -> Result<User, CoreError> {
        self.update_field(ctx, id, UserField::Email, value)
    }

    pub fn change_user_phone_number<C: TransactionContext + ?Sized>(
        &self,
        ctx: &C,
        id: &str,
        value: &str,
    ) -> Result<User, CoreError> {
        self.update_field(ctx, id, UserField::PhoneNumber, value)
    }

    pub fn change_user_address<C: TransactionContext + ?Sized>(
        &self,
        ctx: &C,
        id: &str,
        value: &str,
    ) -> Result<User, CoreError> {
        self.update_field(ctx, id, UserField::Address, value)
    }

    /// Record the hash of the user's KYC document. Only the first upload is
    /// accepted.
    pub fn update_doc_hash<C: TransactionContext + ?Sized>(
        &self,
        ctx: &C,
        id: &str,
        new_hash: &str,
    ) -> Result<User, CoreError> {
        let mut user = self.query_user(ctx, id)?;
        if user.has_document() {
            warn!(tx_id = ctx.tx_id(), key = id, "document already uploaded");
            return Err(CoreError::AlreadySet(id.to_string()));
        }
        user.doc_hash = new_hash.to_string();
        self.write(ctx, id, &user)?;
        debug!(tx_id = ctx.tx_id(), key = id, "document hash recorded");
        Ok(user)
    }

    /// Grant another banker access by appending `,<banker>` to the list.
    /// An empty list therefore gains a leading comma.
    pub fn update_allowed_banker_ids<C: TransactionContext + ?Sized>(
        &self,
        ctx: &C,
        id: &str,
        new_banker_id: &str,
    ) -> Result<User, CoreError> {
        let mut user = self.query_user(ctx, id)?;
        user.allowed_banker_ids.push(',');
        user.allowed_banker_ids.push_str(new_banker_id);
        debug!(
            tx_id = ctx.tx_id(),
            key = id,
            allowed_banker_ids = %user.allowed_banker_ids,
            "banker list extended"
        );
        self.write(ctx, id, &user)?;
        Ok(user)
    }

    /// Remove whatever is stored at `id`. Absent keys are not an error.
    pub fn delete_user<C: TransactionContext + ?Sized>(
        &self,
        ctx: &C,
        id: &str,
    ) -> Result<(), CoreError> {
        ctx.state().del_state(id).map_err(CoreError::StorageWrite)?;
        debug!(tx_id = ctx.tx_id(), key = id, "user deleted");
        Ok(())
    }

    fn write<C: TransactionContext + ?Sized>(
        &self,
        ctx: &C,
        id: &str,
        user: &User,
    ) -> Result<(), CoreError> {
        let bytes = encode(id, user)?;
        ctx.state()
            .put_state(id, &bytes)
            .map_err(CoreError::StorageWrite)
    }
}

fn sample_users() -> Vec<User> {
    vec![User {
        first_name: "Roxane".into(),
        last_name: "Chase".into(),
        gender: "Female".into(),
        email: "roxanechase@gmail.com".into(),
        phone_number: "9876543210".into(),
        address: "Nit Warangal,506009".into(),
        registration_id: "64072cbb5ac4a4f35e8c49ce".into(),
        doc_hash: String::new(),
        allowed_banker_ids: "appUser".into(),
    }]
}

/// Lazy scan over world state yielding decoded users.
///
/// Finite and single-pass. The first error ends the scan. The underlying
/// iterator is closed by `finish`, after the first error, or on drop.
pub struct UserScan<'a> {
    iter: Option<Box<dyn StateIterator + 'a>>,
}

impl UserScan<'_> {
    /// Close the iteration handle and report a failed release.
    pub fn finish(mut self) -> Result<(), CoreError> {
        match self.iter.take() {
            Some(mut iter) => iter.close().map_err(CoreError::StorageRead),
            None => Ok(()),
        }
    }

    fn release(&mut self) {
        if let Some(mut iter) = self.iter.take() {
            if let Err(e) = iter.close() {
                warn!(error = %e, "failed to close world state iterator");
            }
        }
    }
}

impl Iterator for UserScan<'_> {
    type Item = Result<QueryResult, CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.iter.as_mut()?.next_entry();
        let item = match next {
            None => return None,
            Some(Err(e)) => Err(CoreError::StorageRead(e)),
            Some(Ok(kv)) => decode(&kv.key, &kv.value).map(|record| QueryResult {
                key: kv.key,
                record,
            }),
        };
        if item.is_err() {
            self.release();
        }
        Some(item)
    }
}

impl Drop for UserScan<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
