use crate::cli::RenderArgs;
use colored::*;
use dockerfile_transform::config::Config;
use dockerfile_transform::context::RootContext;
use dockerfile_transform::error::{FrontendError, Result};
use dockerfile_transform::frontend::{BuildOptions, Frontend};
use dockerfile_transform::local::{LocalClient, LocalContextResolver, RenderEngine};
use dockerfile_transform::ui::{create_spinner, fail_spinner, finish_spinner};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Dockerfile을 transform에 통과시키고 결과 출력
pub async fn render(args: RenderArgs, config: Config, ctx: RootContext) -> Result<()> {
    let resolver = build_resolver(&args.contexts)?;
    let options = build_options(&args.opts, &args.build_args)?;

    let ctx = match args.timeout {
        Some(secs) => ctx.with_timeout(Duration::from_secs(secs)),
        None => ctx,
    };

    let client = Arc::new(LocalClient::new(options, resolver));
    let frontend = Frontend::new(RenderEngine::new(args.dockerfile_context, args.file), config);

    let spinner = create_spinner("Transforming Dockerfile...");
    let output = match frontend.run_build(&ctx, client).await {
        Ok(output) => {
            finish_spinner(&spinner, "Dockerfile transformed");
            output
        }
        Err(e) => {
            fail_spinner(&spinner, "Transform failed");
            return Err(e);
        }
    };

    match args.output {
        Some(path) => {
            std::fs::write(&path, &output.dockerfile)?;
            eprintln!("{} Wrote {}", "[OK]".green().bold(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&output.dockerfile)?;
            stdout.flush()?;
        }
    }

    Ok(())
}

fn build_resolver(contexts: &[String]) -> Result<LocalContextResolver> {
    let mut resolver = LocalContextResolver::new();

    if contexts.is_empty() {
        resolver.insert("main", PathBuf::from("."));
    }

    for raw in contexts {
        let (name, dir) = BuildOptions::parse_pair(raw)?;
        let dir = PathBuf::from(dir);
        if !dir.is_dir() {
            return Err(FrontendError::ConfigError(format!(
                "context '{}' is not a directory: {}",
                name,
                dir.display()
            )));
        }
        resolver.insert(name, dir);
    }

    Ok(resolver)
}

fn build_options(opts: &[String], build_args: &[String]) -> Result<BuildOptions> {
    let mut options = BTreeMap::new();

    for raw in opts {
        let (key, value) = BuildOptions::parse_pair(raw)?;
        options.insert(key, value);
    }
    for raw in build_args {
        let (key, value) = BuildOptions::parse_pair(raw)?;
        options.insert(format!("build-arg:{}", key), value);
    }

    Ok(BuildOptions::new(options))
}
