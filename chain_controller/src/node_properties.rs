use anyhow::Result;
use helper_functions::error::Error as LookupError;
use serde::{Deserialize, Serialize};
use types::{
    keys::PublicKeyBytes,
    nonstandard::SkipFlags,
    primitives::{AccountName, VoteWeight},
    state::ChainState,
};

/// Settings of the running node that are not part of chain state.
#[derive(Clone, Default, Debug, Serialize)]
pub struct NodeProperties {
    /// Added to the flags passed to every call that accepts them.
    pub skip_flags: SkipFlags,
    /// Reapplied after every block in the order they were made.
    pub debug_updates: Vec<DebugUpdate>,
}

/// Out-of-band change to chain state for testing and inspection.
///
/// Nodes that use these diverge from the rest of the network.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DebugUpdate {
    SetProducerSigningKey {
        producer: AccountName,
        signing_key: PublicKeyBytes,
    },
    SetProducerVotes {
        producer: AccountName,
        votes: VoteWeight,
    },
    CreateAccount {
        name: AccountName,
        owner_key: Option<PublicKeyBytes>,
    },
}

impl DebugUpdate {
    pub fn apply(&self, state: &mut ChainState) -> Result<()> {
        match self {
            Self::SetProducerSigningKey {
                producer,
                signing_key,
            } => {
                state
                    .producers
                    .get_mut(producer)
                    .ok_or_else(|| unknown_producer(producer))?
                    .signing_key = *signing_key;
            }
            Self::SetProducerVotes { producer, votes } => {
                state
                    .producers
                    .get_mut(producer)
                    .ok_or_else(|| unknown_producer(producer))?
                    .votes = *votes;
            }
            Self::CreateAccount { name, owner_key } => {
                let now = state.dynamic_global_properties.time;
                state.create_account(name.clone(), *owner_key, now);
            }
        }

        Ok(())
    }
}

fn unknown_producer(producer: &AccountName) -> LookupError {
    LookupError::UnknownProducer {
        producer: producer.clone(),
    }
}

#[cfg(test)]
mod tests {
    use types::{keys::SecretKey, state::ProducerObject};

    use super::*;

    fn state_with_producer(producer: &str) -> ChainState {
        let mut state = ChainState::default();

        state.producers.insert(
            producer.into(),
            ProducerObject {
                owner: producer.into(),
                ..ProducerObject::default()
            },
        );

        state
    }

    #[test]
    fn updates_are_applied_to_producers() -> Result<()> {
        let mut state = state_with_producer("alice");
        let signing_key = SecretKey::from_phrase("new key").to_public_key();

        DebugUpdate::SetProducerSigningKey {
            producer: "alice".into(),
            signing_key,
        }
        .apply(&mut state)?;

        DebugUpdate::SetProducerVotes {
            producer: "alice".into(),
            votes: 7,
        }
        .apply(&mut state)?;

        let producer = &state.producers[&AccountName::from("alice")];

        assert_eq!(producer.signing_key, signing_key);
        assert_eq!(producer.votes, 7);

        Ok(())
    }

    #[test]
    fn updating_unknown_producer_fails() {
        let mut state = state_with_producer("alice");

        let update = DebugUpdate::SetProducerVotes {
            producer: "mallory".into(),
            votes: 1,
        };

        assert!(update.apply(&mut state).is_err());
    }

    #[test]
    fn updates_are_tagged_in_json() -> serde_json::Result<()> {
        let update = serde_json::from_str::<DebugUpdate>(
            r#"{ "kind": "create_account", "name": "dave", "owner_key": null }"#,
        )?;

        assert_eq!(
            update,
            DebugUpdate::CreateAccount {
                name: "dave".into(),
                owner_key: None,
            },
        );

        Ok(())
    }
}
