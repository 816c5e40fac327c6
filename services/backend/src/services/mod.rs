pub mod bets;
pub mod registry;
pub mod scheduler;
pub mod settlement;
pub mod wallet;

pub use bets::BetEngine;
pub use registry::LotteryRegistry;
pub use scheduler::DrawScheduler;
pub use settlement::SettlementEngine;
pub use wallet::WalletService;
