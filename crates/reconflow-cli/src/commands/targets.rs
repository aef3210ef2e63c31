use super::Context;
use crate::cli::{TargetsArgs, TargetsCommand};
use reconflow_db::targets;

pub async fn run(ctx: &Context, args: TargetsArgs) -> anyhow::Result<()> {
    match args.command {
        TargetsCommand::Add {
            domain,
            name,
            scope,
        } => {
            let target = targets::create_target(ctx.db().pool(), &domain, name, scope).await?;
            println!("{}\t{}", target.id, target.domain);
        }
        TargetsCommand::List => {
            for target in targets::list_targets(ctx.db().pool()).await? {
                println!(
                    "{}\t{}\t{}",
                    target.id,
                    target.domain,
                    target.name.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}
