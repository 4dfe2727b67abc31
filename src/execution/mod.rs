pub mod instruction_assembler;
pub mod jupiter_router;
pub mod rpc_ledger;

pub use instruction_assembler::{InstructionAssembler, InstructionBundle};
pub use jupiter_router::{
    JupiterRouter, Quote, QuoteRequest, QuoteSource, SwapInstructionOptions, SwapInstructionSource,
    SwapInstructionsResponse,
};
pub use rpc_ledger::{Ledger, RpcLedger, SimulationOutcome};
