use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dockerfile-transform")]
#[command(version)]
#[command(about = "Rewrite Dockerfiles through an external transform before building", long_about = None)]
pub struct Cli {
    /// 설정 파일 경로 (기본: ~/.config/dockerfile-transform/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 디버그 로그 출력
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// JSON 형식 로그 출력
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the transform on a Dockerfile and print the effective result
    Render(RenderArgs),

    /// Fetch a file through the relay (for use inside transform processes)
    Fetch(FetchArgs),
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// 빌드 컨텍스트 (NAME=DIR, 반복 가능). 기본값: main=.
    #[arg(long = "context", value_name = "NAME=DIR")]
    pub contexts: Vec<String>,

    /// Frontend option passed to the transform (KEY=VALUE, repeatable)
    #[arg(long = "opt", value_name = "KEY=VALUE")]
    pub opts: Vec<String>,

    /// Build argument, passed as option `build-arg:KEY` (repeatable)
    #[arg(long = "build-arg", value_name = "KEY=VALUE")]
    pub build_args: Vec<String>,

    /// Dockerfile path inside the Dockerfile context
    #[arg(short = 'f', long = "file", default_value = "Dockerfile")]
    pub file: String,

    /// Context holding the Dockerfile
    #[arg(long, default_value = "main")]
    pub dockerfile_context: String,

    /// 결과를 파일로 저장 (미지정시 stdout)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Abort the build after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// 빌드 컨텍스트 이름
    pub context: String,

    /// 컨텍스트 안의 파일 경로
    pub filename: String,

    /// Relay address (default: $DOCKERFILE_RELAY_ADDR)
    #[arg(long)]
    pub addr: Option<String>,
}
