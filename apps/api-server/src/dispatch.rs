//! Invocation dispatch: maps a contract function name plus positional string
//! arguments onto `KycRegistry` calls, the way a ledger peer routes a
//! transaction proposal to chaincode.

use domain::registry::KycRegistry;
use domain::{CoreError, NewUser, TransactionContext, UserField};
use serde::Deserialize;
use serde_json::Value;

/// Body of `POST /api/invoke`.
#[derive(Debug, Clone, Deserialize)]
pub struct InvokeRequest {
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("unknown function {0:?}")]
    UnknownFunction(String),
    #[error("{function} expects {expected} argument(s), got {got}")]
    Arity {
        function: &'static str,
        expected: usize,
        got: usize,
    },
    #[error(transparent)]
    Contract(#[from] CoreError),
    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Contract functions exposed to invokers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    InitLedger,
    CreateUser,
    QueryUser,
    QueryAllUsers,
    UserExists,
    ChangeField(UserField),
    UpdateDocHash,
    UpdateAllowedBankerIds,
    DeleteUser,
}

impl Function {
    pub fn parse(name: &str) -> Option<Self> {
        let f = match name {
            "InitLedger" => Self::InitLedger,
            "CreateUser" => Self::CreateUser,
            "QueryUser" => Self::QueryUser,
            "QueryAllUsers" => Self::QueryAllUsers,
            "UserExists" => Self::UserExists,
            "ChangeUserFirstName" => Self::ChangeField(UserField::FirstName),
            "ChangeUserLastName" => Self::ChangeField(UserField::LastName),
            "ChangeGender" => Self::ChangeField(UserField::Gender),
            "ChangeUserEmail" => Self::ChangeField(UserField::Email),
            "ChangeUserPhoneNumber" => Self::ChangeField(UserField::PhoneNumber),
            "ChangeUserAddress" => Self::ChangeField(UserField::Address),
            "UpdateDocHash" => Self::UpdateDocHash,
            "UpdateAllowedBankerIds" => Self::UpdateAllowedBankerIds,
            "DeleteUser" => Self::DeleteUser,
            _ => return None,
        };
        Some(f)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::InitLedger => "InitLedger",
            Self::CreateUser => "CreateUser",
            Self::QueryUser => "QueryUser",
            Self::QueryAllUsers => "QueryAllUsers",
            Self::UserExists => "UserExists",
            Self::ChangeField(UserField::FirstName) => "ChangeUserFirstName",
            Self::ChangeField(UserField::LastName) => "ChangeUserLastName",
            Self::ChangeField(UserField::Gender) => "ChangeGender",
            Self::ChangeField(UserField::Email) => "ChangeUserEmail",
            Self::ChangeField(UserField::PhoneNumber) => "ChangeUserPhoneNumber",
            Self::ChangeField(UserField::Address) => "ChangeUserAddress",
            Self::UpdateDocHash => "UpdateDocHash",
            Self::UpdateAllowedBankerIds => "UpdateAllowedBankerIds",
            Self::DeleteUser => "DeleteUser",
        }
    }

    /// Number of positional arguments the function takes.
    pub fn arity(&self) -> usize {
        match self {
            Self::InitLedger | Self::QueryAllUsers => 0,
            Self::QueryUser | Self::UserExists | Self::DeleteUser => 1,
            Self::ChangeField(_) | Self::UpdateDocHash | Self::UpdateAllowedBankerIds => 2,
            // id, firstName, lastName, gender, email, phoneNumber, address, bankerId
            Self::CreateUser => 8,
        }
    }
}

/// Run one invocation. Read functions return their result as JSON; writes
/// return `null`.
pub fn invoke<C: TransactionContext + ?Sized>(
    registry: &KycRegistry,
    ctx: &C,
    req: &InvokeRequest,
) -> Result<Value, InvokeError> {
    let function = Function::parse(&req.function)
        .ok_or_else(|| InvokeError::UnknownFunction(req.function.clone()))?;
    if req.args.len() != function.arity() {
        return Err(InvokeError::Arity {
            function: function.name(),
            expected: function.arity(),
            got: req.args.len(),
        });
    }
    let args = &req.args;

    let result = match function {
        Function::InitLedger => {
            registry.init_ledger(ctx)?;
            Value::Null
        }
        Function::CreateUser => {
            let input = NewUser {
                first_name: args[1].clone(),
                last_name: args[2].clone(),
                gender: args[3].clone(),
                email: args[4].clone(),
                phone_number: args[5].clone(),
                address: args[6].clone(),
                banker_id: args[7].clone(),
            };
            registry.create_user(ctx, &args[0], input)?;
            Value::Null
        }
        Function::QueryUser => serde_json::to_value(registry.query_user(ctx, &args[0])?)?,
        Function::QueryAllUsers => serde_json::to_value(registry.query_all_users(ctx)?)?,
        Function::UserExists => Value::Bool(registry.user_exists(ctx, &args[0])?),
        Function::ChangeField(field) => {
            registry.update_field(ctx, &args[0], field, &args[1])?;
            Value::Null
        }
        Function::UpdateDocHash => {
            registry.update_doc_hash(ctx, &args[0], &args[1])?;
            Value::Null
        }
        Function::UpdateAllowedBankerIds => {
            registry.update_allowed_banker_ids(ctx, &args[0], &args[1])?;
            Value::Null
        }
        Function::DeleteUser => {
            registry.delete_user(ctx, &args[0])?;
            Value::Null
        }
    };
    Ok(result)
}
