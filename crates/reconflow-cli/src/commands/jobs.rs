use super::{parse_job_id, parse_target_id, print_json, Context};

pub async fn status(ctx: &Context, job_id: &str) -> anyhow::Result<()> {
    let job = ctx.engine().get_job_status(&parse_job_id(job_id)?).await?;
    print_json(&job)
}

pub async fn list(ctx: &Context, target: Option<&str>) -> anyhow::Result<()> {
    let jobs = match target {
        Some(target) => {
            ctx.engine()
                .list_jobs_for_target(&parse_target_id(target)?)
                .await?
        }
        None => ctx.engine().list_jobs().await?,
    };
    for job in jobs {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            job.id,
            job.target_id,
            job.scan_type,
            job.status,
            job.started_at.to_rfc3339()
        );
    }
    Ok(())
}

pub async fn results(ctx: &Context, target_id: &str) -> anyhow::Result<()> {
    let results = ctx
        .engine()
        .get_recon_results(&parse_target_id(target_id)?)
        .await?;
    print_json(&results)
}

pub async fn files(ctx: &Context, domain: &str, job: Option<&str>) -> anyhow::Result<()> {
    let job_id = job.map(parse_job_id).transpose()?;
    for file in ctx.engine().get_output_files(domain, job_id.as_ref()).await? {
        println!(
            "{}\t{}\t{}",
            file.name,
            file.size,
            file.modified_at.to_rfc3339()
        );
    }
    Ok(())
}
