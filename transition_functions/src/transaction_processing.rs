use anyhow::{ensure, Context as _, Result};
use database::Database;
use helper_functions::accessors;
use itertools::Itertools as _;
use types::{
    containers::{Message, SignedTransaction},
    nonstandard::{Skip, SkipFlags},
    primitives::UnixSeconds,
    state::ChainState,
};

use crate::{
    error::{HandlerError, HandlerStage, ValidationError},
    handlers::{ApplyContext, MessageHandlers, PreconditionContext, ValidateContext},
};

/// Checks a transaction against `state` without modifying it.
///
/// `now` is the time the transaction would be included at:
/// the head block time for pending transactions or the block timestamp when applying a block.
pub fn validate_transaction(
    state: &ChainState,
    handlers: &MessageHandlers,
    transaction: &SignedTransaction,
    now: UnixSeconds,
    skip: SkipFlags,
) -> Result<()> {
    ensure!(!transaction.messages.is_empty(), ValidationError::NoMessages);

    if skip.contains(Skip::Validate) {
        return Ok(());
    }

    if !skip.contains(Skip::TransactionDupeCheck) {
        validate_uniqueness(state, transaction)?;
    }

    if !skip.contains(Skip::TaposCheck) {
        validate_tapos(state, transaction)?;
    }

    validate_expiration(state, transaction, now)?;
    validate_referenced_accounts(state, transaction)?;
    validate_message_types(state, transaction)?;

    if !skip.contains(Skip::AuthorityCheck) && !skip.contains(Skip::TransactionSignatures) {
        validate_authority(state, transaction)?;
    }

    if !skip.contains(Skip::AssertEvaluation) {
        run_validate_handlers(handlers, transaction)?;
    }

    Ok(())
}

/// Validates and applies a transaction in its own undo session.
///
/// On success the session is squashed into the enclosing one.
/// On failure every change made by the transaction is undone.
pub fn apply_transaction(
    database: &mut Database<ChainState>,
    handlers: &MessageHandlers,
    transaction: &SignedTransaction,
    now: UnixSeconds,
    skip: SkipFlags,
) -> Result<()> {
    let mut session = database.start_undo_session();

    validate_transaction(session.state(), handlers, transaction, now, skip)?;

    for message in &transaction.messages {
        process_message(session.state_mut(), handlers, transaction, message)?;
    }

    // Recorded even when the duplicate check is skipped.
    session.state_mut().record_transaction(transaction.clone());

    session.squash();

    Ok(())
}

/// Runs precondition and apply handlers for every scope of `message`.
pub fn process_message(
    state: &mut ChainState,
    handlers: &MessageHandlers,
    transaction: &SignedTransaction,
    message: &Message,
) -> Result<()> {
    for scope in message.scopes() {
        let handler_error = |stage| HandlerError {
            stage,
            code: message.code.clone(),
            scope: scope.clone(),
            message_type: message.message_type.clone(),
        };

        if let Some(handler) = handlers.precondition_handler(message, scope) {
            handler(&PreconditionContext {
                state: &*state,
                transaction,
                message,
                scope,
            })
            .with_context(|| handler_error(HandlerStage::Precondition))?;
        }

        if let Some(handler) = handlers.apply_handler(message, scope) {
            handler(&mut ApplyContext {
                state: &mut *state,
                transaction,
                message,
                scope,
            })
            .with_context(|| handler_error(HandlerStage::Apply))?;
        }
    }

    Ok(())
}

fn validate_uniqueness(state: &ChainState, transaction: &SignedTransaction) -> Result<()> {
    let transaction_id = transaction.id();

    ensure!(
        !state.transactions.contains_key(&transaction_id),
        ValidationError::DuplicateTransaction { transaction_id },
    );

    Ok(())
}

fn validate_tapos(state: &ChainState, transaction: &SignedTransaction) -> Result<()> {
    let valid = accessors::get_block_summary(state, transaction.ref_block_num)
        .is_some_and(|block_id| transaction.verify_reference_block(block_id));

    ensure!(
        valid,
        ValidationError::InvalidReference {
            ref_block_num: transaction.ref_block_num,
            ref_block_prefix: transaction.ref_block_prefix,
        },
    );

    Ok(())
}

fn validate_expiration(
    state: &ChainState,
    transaction: &SignedTransaction,
    now: UnixSeconds,
) -> Result<()> {
    let expiration = transaction.expiration;
    let maximum = now
        + state
            .global_properties
            .configuration
            .max_transaction_lifetime;

    ensure!(
        now <= expiration,
        ValidationError::Expired { expiration, now },
    );

    ensure!(
        expiration <= maximum,
        ValidationError::ExpirationTooFar {
            expiration,
            maximum,
        },
    );

    Ok(())
}

fn validate_referenced_accounts(state: &ChainState, transaction: &SignedTransaction) -> Result<()> {
    for message in &transaction.messages {
        for account in message.referenced_accounts() {
            ensure!(
                state.accounts.contains_key(account),
                ValidationError::UnknownAccount {
                    account: account.clone(),
                },
            );
        }

        let sorted_and_unique = message
            .recipients
            .iter()
            .tuple_windows()
            .all(|(previous, next)| previous < next);

        ensure!(
            sorted_and_unique,
            ValidationError::UnsortedRecipients {
                recipients: message.recipients.clone(),
            },
        );
    }

    Ok(())
}

fn validate_message_types(state: &ChainState, transaction: &SignedTransaction) -> Result<()> {
    for message in &transaction.messages {
        ensure!(
            state.is_message_type_registered(&message.code, &message.message_type),
            ValidationError::UnknownMessageType {
                code: message.code.clone(),
                message_type: message.message_type.clone(),
            },
        );
    }

    Ok(())
}

fn validate_authority(state: &ChainState, transaction: &SignedTransaction) -> Result<()> {
    let authorizing_accounts = transaction
        .messages
        .iter()
        .flat_map(|message| &message.authorization)
        .unique();

    for account in authorizing_accounts {
        let owner_key = accessors::get_account(state, account)?.owner_key;

        if let Some(public_key) = owner_key {
            ensure!(
                transaction.is_signed_by(public_key),
                ValidationError::AuthorityFailure {
                    account: account.clone(),
                },
            );
        }
    }

    Ok(())
}

fn run_validate_handlers(handlers: &MessageHandlers, transaction: &SignedTransaction) -> Result<()> {
    for message in &transaction.messages {
        if let Some(handler) = handlers.validate_handler(message, &message.code) {
            handler(&ValidateContext {
                transaction,
                message,
            })
            .with_context(|| HandlerError {
                stage: HandlerStage::Validate,
                code: message.code.clone(),
                scope: message.code.clone(),
                message_type: message.message_type.clone(),
            })?;
        }
    }

    Ok(())
}
