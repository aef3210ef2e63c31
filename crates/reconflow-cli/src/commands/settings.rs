use super::Context;
use crate::cli::{SettingsArgs, SettingsCommand};
use reconflow_db::settings;

pub async fn run(ctx: &Context, args: SettingsArgs) -> anyhow::Result<()> {
    let pool = ctx.db().pool();
    match args.command {
        SettingsCommand::Set { key, value } => {
            settings::set_setting(pool, &key, &value).await?;
            println!("{key} saved");
        }
        SettingsCommand::List => {
            for (key, value) in settings::list_settings_masked(pool).await? {
                println!("{key}\t{value}");
            }
        }
        SettingsCommand::Delete { key } => {
            settings::delete_setting(pool, &key).await?;
            println!("{key} deleted");
        }
    }
    Ok(())
}
