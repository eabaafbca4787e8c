// Purpose: FM voices and the composites that layer them
// Everything here is wiring: the nodes do the work, these types own them

pub mod layer;
pub mod voice;

pub use layer::{Layer, LayerConfig, LayerVoice, PartialBank, PartialBankConfig};
pub use voice::{Voice, VoiceConfig};

use crate::automation::Param;
use crate::error::{GraphError, Result};
use crate::graph::Node;

/// Move a port's parameter out of `node` so a composite can expose it.
pub(crate) fn take_param(node: &mut Node, port: usize) -> Result<Param> {
    node.take_param(port).ok_or_else(|| {
        GraphError::UnknownInput {
            node: node.id().index(),
            port,
        }
        .into()
    })
}
