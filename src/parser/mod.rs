pub mod abi;
pub mod contracts;

pub use abi::{AbiDecoder, DecodedCall};
pub use contracts::{parse, ParsedContract, Resource};
