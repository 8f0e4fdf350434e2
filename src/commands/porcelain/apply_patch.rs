use crate::areas::repository::Context;
use crate::artifacts::patch::Patch;
use crate::commands::plumbing::verify_patch::VerifyPatch;
use crate::commands::{Plumbing, Porcelain};
use crate::errors::Error;

/// Apply a patch to the working tree
///
/// Without `partial` the patch applies completely or not at all. With it, the
/// changes that apply are made and the rest are handed back. Either way the
/// output is the rejected part, empty when everything applied.
#[derive(Debug, Clone)]
pub struct ApplyPatchOp {
    patch: Patch,
    partial: bool,
    reverse: bool,
}

impl ApplyPatchOp {
    pub fn new(patch: Patch) -> Self {
        ApplyPatchOp {
            patch,
            partial: false,
            reverse: false,
        }
    }

    pub fn partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }
}

impl Porcelain for ApplyPatchOp {
    type Output = Patch;

    #[tracing::instrument(name = "apply", skip_all, fields(changes = self.patch.count(), partial = self.partial, reverse = self.reverse))]
    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Patch> {
        let verified = VerifyPatch::new(self.patch).reverse(self.reverse).execute(ctx).await?;
        if !self.partial && !verified.to_reject.is_empty() {
            return Err(Error::CannotApplyPatch {
                rejected: verified.to_reject,
            }
            .into());
        }

        let patch = verified.to_apply;
        ctx.working_tree().apply_patch(&patch)?;

        tracing::info!(
            applied = patch.count(),
            rejected = verified.to_reject.count(),
            "applied patch"
        );
        Ok(verified.to_reject)
    }
}
