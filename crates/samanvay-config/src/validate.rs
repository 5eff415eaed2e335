use samanvay_core::ChatMessage;

use crate::{ConfigError, SamanvayConfig};

/// Room for the `{"event":"message","data":...}` envelope around the text.
const MESSAGE_ENVELOPE_BYTES: usize = 64;

pub(crate) fn validate_startup(config: &SamanvayConfig) -> Result<(), ConfigError> {
    config.validate()?;

    // Worst case every character needs four UTF-8 bytes.
    let required = ChatMessage::MAX_TEXT_CHARS * 4 + MESSAGE_ENVELOPE_BYTES;
    if config.transport.max_frame_bytes < required {
        return Err(ConfigError::FrameLimitBelowChatMessage {
            max_frame_bytes: config.transport.max_frame_bytes,
            required,
        });
    }

    Ok(())
}
