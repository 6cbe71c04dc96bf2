use enumset::{enum_set, EnumSet, EnumSetType};

/// Checks that can be skipped when processing blocks and transactions.
///
/// Skipping is meant for trusted input: blocks read back from the block log, blocks produced by
/// the running node itself and genesis messages.
#[derive(Debug, Hash, EnumSetType)]
pub enum Skip {
    ProducerSignature,
    TransactionSignatures,
    TransactionDupeCheck,
    /// Apply blocks directly on top of the head without fork resolution.
    ForkDb,
    BlockSizeCheck,
    TaposCheck,
    AuthorityCheck,
    MerkleCheck,
    /// Stateless message validation handlers.
    AssertEvaluation,
    UndoHistoryCheck,
    ProducerScheduleCheck,
    /// Every transaction validation.
    Validate,
}

pub type SkipFlags = EnumSet<Skip>;

/// Flags used to replay blocks that have already been validated once.
pub const REPLAY_SKIP_FLAGS: SkipFlags = enum_set!(
    Skip::ProducerSignature
        | Skip::TransactionSignatures
        | Skip::TransactionDupeCheck
        | Skip::ForkDb
        | Skip::BlockSizeCheck
        | Skip::TaposCheck
        | Skip::AuthorityCheck
        | Skip::MerkleCheck
        | Skip::UndoHistoryCheck
        | Skip::ProducerScheduleCheck
);

/// Flags used to process messages returned by a chain initializer.
pub const GENESIS_SKIP_FLAGS: SkipFlags = enum_set!(
    Skip::TransactionSignatures
        | Skip::TransactionDupeCheck
        | Skip::TaposCheck
        | Skip::AuthorityCheck
        | Skip::AssertEvaluation
);
