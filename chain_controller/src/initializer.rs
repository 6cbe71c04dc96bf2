use anyhow::{ensure, Result};
use log::info;
use transition_functions::MessageHandlers;
use types::{
    config::{BlockchainConfiguration, Config},
    containers::{Message, SignedTransaction, Transaction},
    keys::PublicKeyBytes,
    nonstandard::GENESIS_SKIP_FLAGS,
    primitives::{block_summary_index, AccountName, BlockId, TypeName, UnixSeconds},
    state::{ChainState, ProducerObject},
};

use crate::error::Error;

/// Source of the initial chain state.
///
/// Used exactly once per chain, before block 1 exists.
pub trait ChainInitializer {
    fn start_time(&self) -> UnixSeconds;

    fn start_configuration(&self) -> BlockchainConfiguration;

    /// Producers of the first round in schedule order along with their signing keys.
    fn start_producers(&self) -> Vec<(AccountName, PublicKeyBytes)>;

    /// Makes changes to the initial state and returns messages to dispatch to handlers.
    ///
    /// Called after producers and global properties have been created.
    fn prepare(&self, state: &mut ChainState) -> Result<Vec<Message>>;
}

/// [`ChainInitializer`] configured in code.
#[derive(Clone, Debug)]
pub struct GenesisInitializer {
    start_time: UnixSeconds,
    configuration: BlockchainConfiguration,
    producers: Vec<(AccountName, PublicKeyBytes)>,
    accounts: Vec<(AccountName, Option<PublicKeyBytes>)>,
    message_types: Vec<(AccountName, TypeName)>,
    messages: Vec<Message>,
}

impl GenesisInitializer {
    #[must_use]
    pub fn new(
        start_time: UnixSeconds,
        producers: impl IntoIterator<Item = (AccountName, PublicKeyBytes)>,
    ) -> Self {
        Self {
            start_time,
            configuration: BlockchainConfiguration::default(),
            producers: producers.into_iter().collect(),
            accounts: vec![],
            message_types: vec![],
            messages: vec![],
        }
    }

    #[must_use]
    pub const fn with_configuration(mut self, configuration: BlockchainConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    #[must_use]
    pub fn with_account(
        mut self,
        name: impl Into<AccountName>,
        owner_key: Option<PublicKeyBytes>,
    ) -> Self {
        self.accounts.push((name.into(), owner_key));
        self
    }

    #[must_use]
    pub fn with_message_type(
        mut self,
        scope: impl Into<AccountName>,
        name: impl Into<TypeName>,
    ) -> Self {
        self.message_types.push((scope.into(), name.into()));
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }
}

impl ChainInitializer for GenesisInitializer {
    fn start_time(&self) -> UnixSeconds {
        self.start_time
    }

    fn start_configuration(&self) -> BlockchainConfiguration {
        self.configuration
    }

    fn start_producers(&self) -> Vec<(AccountName, PublicKeyBytes)> {
        self.producers.clone()
    }

    fn prepare(&self, state: &mut ChainState) -> Result<Vec<Message>> {
        for (name, owner_key) in self.accounts.iter().cloned() {
            state.create_account(name, owner_key, self.start_time);
        }

        for (scope, name) in self.message_types.iter().cloned() {
            state.register_message_type(scope, name);
        }

        Ok(self.messages.clone())
    }
}

pub fn genesis_state(
    config: &Config,
    handlers: &MessageHandlers,
    initializer: &impl ChainInitializer,
) -> Result<ChainState> {
    let start_time = initializer.start_time();
    let block_interval_seconds = config.block_interval_seconds;

    ensure!(
        start_time > 0 && start_time % block_interval_seconds == 0,
        Error::GenesisTimeNotAligned {
            start_time,
            block_interval_seconds,
        },
    );

    let producers = initializer.start_producers();

    ensure!(!producers.is_empty(), Error::NoProducers);

    let configuration = initializer.start_configuration();
    let mut state = ChainState::default();

    for (owner, signing_key) in &producers {
        state.create_account(owner.clone(), Some(*signing_key), start_time);

        state.producers.insert(
            owner.clone(),
            ProducerObject {
                owner: owner.clone(),
                signing_key: *signing_key,
                votes: 0,
                configuration,
                last_aslot: 0,
                last_confirmed_block_num: 0,
                total_missed: 0,
            },
        );
    }

    state.global_properties.configuration = configuration;
    state.global_properties.active_producers =
        producers.into_iter().map(|(owner, _)| owner).collect();

    let dynamic = &mut state.dynamic_global_properties;
    dynamic.time = start_time;
    dynamic.recent_slots_filled = u128::MAX;

    state
        .block_summaries
        .insert(block_summary_index(0), BlockId::zero());

    let messages = initializer.prepare(&mut state)?;

    if !messages.is_empty() {
        let transaction = SignedTransaction::from(Transaction {
            expiration: start_time,
            messages,
            ..Transaction::default()
        });

        transition_functions::validate_transaction(
            &state,
            handlers,
            &transaction,
            start_time,
            GENESIS_SKIP_FLAGS,
        )?;

        for message in &transaction.messages {
            transition_functions::process_message(&mut state, handlers, &transaction, message)?;
        }
    }

    info!(
        "created genesis state (start_time: {start_time}, producers: {:?})",
        state.global_properties.active_producers,
    );

    Ok(state)
}

#[cfg(test)]
mod tests {
    use types::keys::SecretKey;

    use super::*;

    fn producers(names: &[&str]) -> Vec<(AccountName, PublicKeyBytes)> {
        names
            .iter()
            .map(|name| ((*name).into(), SecretKey::from_phrase(name).to_public_key()))
            .collect()
    }

    #[test]
    fn genesis_state_contains_producers_in_schedule_order() -> Result<()> {
        let initializer = GenesisInitializer::new(3000, producers(&["carol", "alice", "bob"]));
        let state = genesis_state(&Config::default(), &MessageHandlers::new(), &initializer)?;

        assert_eq!(
            state.global_properties.active_producers,
            [AccountName::from("carol"), "alice".into(), "bob".into()],
        );
        assert_eq!(state.producers.len(), 3);
        assert_eq!(state.accounts.len(), 3);
        assert_eq!(state.dynamic_global_properties.time, 3000);
        assert_eq!(state.dynamic_global_properties.recent_slots_filled, u128::MAX);

        Ok(())
    }

    #[test]
    fn genesis_time_must_be_aligned() {
        let initializer = GenesisInitializer::new(3001, producers(&["alice"]));
        let result = genesis_state(&Config::default(), &MessageHandlers::new(), &initializer);

        assert!(matches!(
            result.map_err(anyhow::Error::downcast::<Error>),
            Err(Ok(Error::GenesisTimeNotAligned { start_time: 3001, .. })),
        ));
    }

    #[test]
    fn genesis_requires_producers() {
        let initializer = GenesisInitializer::new(3000, []);
        let result = genesis_state(&Config::default(), &MessageHandlers::new(), &initializer);

        assert!(matches!(
            result.map_err(anyhow::Error::downcast::<Error>),
            Err(Ok(Error::NoProducers)),
        ));
    }

    #[test]
    fn genesis_messages_are_dispatched_without_signatures() -> Result<()> {
        let mut handlers = MessageHandlers::new();

        handlers.set_apply_handler("registry", None, "register", |context| {
            context.set_storage_row("name", context.message.data.clone());
            Ok(())
        });

        let initializer = GenesisInitializer::new(3000, producers(&["alice"]))
            .with_account("registry", None)
            .with_message_type("registry", "register")
            .with_message(
                Message::new("registry", "register", "genesis")
                    .with_authorization(["alice".into()]),
            );

        let state = genesis_state(&Config::default(), &handlers, &initializer)?;

        assert_eq!(
            state.storage_row(&"registry".into(), "name"),
            Some(b"genesis".as_slice()),
        );

        Ok(())
    }

    #[test]
    fn genesis_messages_must_have_registered_types() {
        let initializer = GenesisInitializer::new(3000, producers(&["alice"]))
            .with_account("registry", None)
            .with_message(Message::new("registry", "register", ""));

        assert!(
            genesis_state(&Config::default(), &MessageHandlers::new(), &initializer).is_err()
        );
    }
}
