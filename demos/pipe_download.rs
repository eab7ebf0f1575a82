//! Stream a response body straight into a file.
//!
//! Usage: `cargo run --example pipe_download -- <url> <path>`

use futures_util::io::AllowStdIo;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "https://www.rust-lang.org/".to_owned());
    let path = args.next().unwrap_or_else(|| "download.html".to_owned());

    let file = AllowStdIo::new(std::fs::File::create(&path)?);
    let head = request_shim::get(url)?.pipe(file).await?;

    println!(
        "{} {} -> {path} ({})",
        head.status_code(),
        head.url(),
        head.header("content-type").unwrap_or("unknown type")
    );
    Ok(())
}
