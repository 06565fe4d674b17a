use std::time::Duration;

use clap::Parser;
use labterm_lib::app::{self, Cli};

fn main() {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("无法启动运行时: {}", e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(app::dispatch(cli));
    // stdin 读取线程可能仍阻塞在 read 上，不等待它
    runtime.shutdown_timeout(Duration::from_millis(500));

    if let Err(err) = result {
        tracing::error!("{:#}", err);
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}
