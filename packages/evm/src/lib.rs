pub mod binding;
pub mod codec;
pub mod error;

pub use binding::EventBinding;
pub use codec::{
    wrap_item_type, ArgumentDef, Codec, CodecConfig, EntryConfig, EventDef, ModifierConfig,
};
pub use error::RelayError;
