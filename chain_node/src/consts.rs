use types::primitives::UnixSeconds;

pub const APPLICATION_NAME: &str = "chain_node";

pub const DEFAULT_PRODUCERS: &str = "alice,bob,carol";

// 2020-01-01T00:00:00Z
pub const DEFAULT_GENESIS_TIME: UnixSeconds = 1_577_836_800;

pub const DEFAULT_BLOCK_COUNT: u64 = 10;
