use thiserror::Error;
use types::primitives::AccountName;

#[derive(Debug, Error)]
pub enum Error {
    #[error("account {account} does not exist")]
    UnknownAccount { account: AccountName },
    #[error("producer {producer} does not exist")]
    UnknownProducer { producer: AccountName },
}
