pub mod base;
pub mod catalog;
pub mod codec;
pub mod manager;

pub use base::{ImportedLayerDescriptor, LayerError, LayerRef};
pub use catalog::{resolve_layers, InMemoryCatalog};
pub use codec::{decode_layer_entry, decode_layers, encode_layer, encode_layers, CodecError};
pub use manager::LayerList;
