//! Base-access slots
//!
//! Once a member's dispatch entry has been replaced, the only way back to
//! the prototype's own logic is the member's base-access slot: a bound
//! callable that runs the inherited body directly, without going through the
//! dispatch table again.

use std::fmt;
use std::sync::Arc;

use surrogate_sdk::{ArgumentEnvelope, ProxyError, ProxyResult, Value};

use super::classify::MemberSlot;
use crate::metadata::{MethodBody, MethodSignature, TypeInfo};
use crate::object::{Frame, Instance};

/// Un-intercepted entry point of one member
pub struct BaseAccessSlot {
    name: String,
    signature: MethodSignature,
    declaring_type: String,
    target: Option<MethodBody>,
}

impl BaseAccessSlot {
    /// Slot running the member's inherited body
    pub(crate) fn emit(member: &MemberSlot) -> Self {
        Self::with_body(member, member.method.body.clone())
    }

    /// Slot running `body` in place of the inherited one
    pub(crate) fn with_body(member: &MemberSlot, body: Option<MethodBody>) -> Self {
        Self {
            name: format!("__base_{}", member.method.name),
            signature: member.signature(),
            declaring_type: member.declaring_type.clone(),
            target: body,
        }
    }

    /// Generated member name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signature of the member it reaches
    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// Whether there is original logic to run
    pub fn has_implementation(&self) -> bool {
        self.target.is_some()
    }

    pub(crate) fn call(
        &self,
        this: &Arc<Instance>,
        args: &mut ArgumentEnvelope,
        type_args: &[TypeInfo],
    ) -> ProxyResult<Value> {
        match &self.target {
            Some(body) => {
                let mut frame = Frame::new(this, args, type_args);
                body(&mut frame)
            }
            None => Err(ProxyError::Invocation(format!(
                "{}.{} is abstract; there is no base implementation to call",
                self.declaring_type, self.signature
            ))),
        }
    }
}

impl fmt::Debug for BaseAccessSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseAccessSlot")
            .field("name", &self.name)
            .field("signature", &self.signature.to_string())
            .field("has_implementation", &self.has_implementation())
            .finish()
    }
}

/// One slot per classified member, aligned with `members`
pub(crate) fn emit_base_access(members: &[MemberSlot]) -> Vec<Arc<BaseAccessSlot>> {
    members.iter().map(|m| Arc::new(BaseAccessSlot::emit(m))).collect()
}
