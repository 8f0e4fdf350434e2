use crate::areas::refs::RefValue;
use crate::areas::repository::Context;
use crate::commands::Plumbing;
use derive_new::new;

/// Full name and raw value of the ref a short name designates
#[derive(Debug, Clone, new)]
pub struct RefParse {
    #[new(into)]
    name: String,
}

impl Plumbing for RefParse {
    type Output = Option<(String, RefValue)>;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Self::Output> {
        let refs = ctx.refs();
        let Some(full_name) = refs.find(&self.name)? else {
            return Ok(None);
        };

        Ok(refs.get(&full_name)?.map(|value| (full_name, value)))
    }
}
