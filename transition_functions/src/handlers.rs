use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use types::{
    containers::{Message, SignedTransaction},
    primitives::{AccountName, TypeName},
    state::ChainState,
};

/// Stateless check of a message. Runs once per message with the contract as the scope.
pub type ValidateHandler = Arc<dyn Fn(&ValidateContext) -> Result<()> + Send + Sync>;

/// Read-only check of a message against state. Runs once per scope.
pub type PreconditionHandler = Arc<dyn Fn(&PreconditionContext) -> Result<()> + Send + Sync>;

/// Mutation of state by a message. Runs once per scope after the precondition handler.
pub type ApplyHandler = Arc<dyn Fn(&mut ApplyContext) -> Result<()> + Send + Sync>;

pub struct ValidateContext<'context> {
    pub transaction: &'context SignedTransaction,
    pub message: &'context Message,
}

pub struct PreconditionContext<'context> {
    pub state: &'context ChainState,
    pub transaction: &'context SignedTransaction,
    pub message: &'context Message,
    pub scope: &'context AccountName,
}

impl PreconditionContext<'_> {
    #[must_use]
    pub fn storage_row(&self, key: &str) -> Option<&[u8]> {
        self.state.storage_row(self.scope, key)
    }

    #[must_use]
    pub fn is_authorized_by(&self, account: &AccountName) -> bool {
        self.message.authorization.contains(account)
    }
}

pub struct ApplyContext<'context> {
    pub state: &'context mut ChainState,
    pub transaction: &'context SignedTransaction,
    pub message: &'context Message,
    pub scope: &'context AccountName,
}

impl ApplyContext<'_> {
    #[must_use]
    pub fn storage_row(&self, key: &str) -> Option<&[u8]> {
        self.state.storage_row(self.scope, key)
    }

    pub fn set_storage_row(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.state
            .set_storage_row(self.scope.clone(), key.into(), value.into());
    }

    pub fn remove_storage_row(&mut self, key: &str) -> Option<Vec<u8>> {
        self.state.remove_storage_row(self.scope, key)
    }
}

// `scope` is `None` for handlers that apply in every scope.
#[derive(Clone, PartialEq, Eq, Hash)]
struct HandlerKey {
    contract: AccountName,
    scope: Option<AccountName>,
    message_type: TypeName,
}

#[derive(Clone, Default)]
struct HandlerSet {
    validate: Option<ValidateHandler>,
    precondition: Option<PreconditionHandler>,
    apply: Option<ApplyHandler>,
}

/// Handlers for messages keyed by contract, scope and message type.
///
/// Registering a handler for a key that already has one replaces it.
/// Handlers registered for a specific scope take precedence over handlers registered for all scopes.
/// Messages without handlers are accepted without doing anything.
#[derive(Clone, Default)]
pub struct MessageHandlers {
    handlers: HashMap<HandlerKey, HandlerSet>,
}

impl MessageHandlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_validate_handler(
        &mut self,
        contract: impl Into<AccountName>,
        scope: Option<AccountName>,
        message_type: impl Into<TypeName>,
        handler: impl Fn(&ValidateContext) -> Result<()> + Send + Sync + 'static,
    ) {
        self.handler_set(contract.into(), scope, message_type.into())
            .validate = Some(Arc::new(handler));
    }

    pub fn set_precondition_validate_handler(
        &mut self,
        contract: impl Into<AccountName>,
        scope: Option<AccountName>,
        message_type: impl Into<TypeName>,
        handler: impl Fn(&PreconditionContext) -> Result<()> + Send + Sync + 'static,
    ) {
        self.handler_set(contract.into(), scope, message_type.into())
            .precondition = Some(Arc::new(handler));
    }

    pub fn set_apply_handler(
        &mut self,
        contract: impl Into<AccountName>,
        scope: Option<AccountName>,
        message_type: impl Into<TypeName>,
        handler: impl Fn(&mut ApplyContext) -> Result<()> + Send + Sync + 'static,
    ) {
        self.handler_set(contract.into(), scope, message_type.into())
            .apply = Some(Arc::new(handler));
    }

    #[must_use]
    pub fn validate_handler(
        &self,
        message: &Message,
        scope: &AccountName,
    ) -> Option<&ValidateHandler> {
        self.lookup(message, scope, |set| set.validate.as_ref())
    }

    #[must_use]
    pub fn precondition_handler(
        &self,
        message: &Message,
        scope: &AccountName,
    ) -> Option<&PreconditionHandler> {
        self.lookup(message, scope, |set| set.precondition.as_ref())
    }

    #[must_use]
    pub fn apply_handler(&self, message: &Message, scope: &AccountName) -> Option<&ApplyHandler> {
        self.lookup(message, scope, |set| set.apply.as_ref())
    }

    fn handler_set(
        &mut self,
        contract: AccountName,
        scope: Option<AccountName>,
        message_type: TypeName,
    ) -> &mut HandlerSet {
        let key = HandlerKey {
            contract,
            scope,
            message_type,
        };

        self.handlers.entry(key).or_default()
    }

    fn lookup<'handlers, H>(
        &'handlers self,
        message: &Message,
        scope: &AccountName,
        capability: impl Fn(&'handlers HandlerSet) -> Option<&'handlers H>,
    ) -> Option<&'handlers H> {
        let mut key = HandlerKey {
            contract: message.code.clone(),
            scope: Some(scope.clone()),
            message_type: message.message_type.clone(),
        };

        if let Some(handler) = self.handlers.get(&key).and_then(&capability) {
            return Some(handler);
        }

        key.scope = None;

        self.handlers.get(&key).and_then(capability)
    }
}
