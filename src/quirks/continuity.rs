//! Provenance continuity tokens.
//!
//! Families that validate provenance signatures on replayed reasoning
//! reject histories whose signatures were stripped during local
//! serialization. This quirk stamps a constant sentinel annotation on
//! the affected parts so replay passes validation.

use serde_json::json;

use crate::pipeline::CallContext;
use crate::types::{ContentPart, ProviderAnnotations, RequestDescriptor};

use super::Quirk;

/// Sentinel value accepted in place of a stripped provenance signature.
pub const PROVENANCE_SENTINEL: &str = "skip_provenance_validation";

/// Stamps the sentinel on every reasoning part, and on every tool-call
/// part of turns that carry reasoning. Parts that still hold a real
/// annotation for the provider are left alone.
pub struct ContinuityTokens;

impl Quirk for ContinuityTokens {
    fn name(&self) -> &'static str {
        "continuity"
    }

    fn apply(
        &self,
        ctx: &CallContext,
        request: &mut RequestDescriptor,
    ) -> Result<bool, String> {
        if !ctx.capabilities.requires_provenance_signature {
            return Ok(false);
        }
        let provider_id = request.provider_id.clone();
        let mut applied = false;
        for turn in &mut request.turns {
            if !turn.has_reasoning() {
                continue;
            }
            for part in &mut turn.parts {
                let annotations = match part {
                    ContentPart::Reasoning(p) => &mut p.annotations,
                    ContentPart::ToolCall(p) => &mut p.annotations,
                    _ => continue,
                };
                applied |= stamp(annotations, &provider_id)?;
            }
        }
        Ok(applied)
    }
}

fn stamp(annotations: &mut ProviderAnnotations, provider_id: &str) -> Result<bool, String> {
    match annotations.get(provider_id) {
        Some(existing) if !existing.is_object() => Err(format!(
            "malformed annotation for provider '{provider_id}'"
        )),
        Some(_) => Ok(false),
        None => {
            annotations.insert(
                provider_id.to_string(),
                json!({ "signature": PROVENANCE_SENTINEL }),
            );
            Ok(true)
        }
    }
}
