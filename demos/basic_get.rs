//! A basic example: a JSON GET, first awaited, then through a callback.

use serde::Deserialize;
use request_shim::{Options, Settled};

#[derive(Debug, Deserialize)]
struct Todo {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    completed: bool,
}

const URL: &str = "https://jsonplaceholder.typicode.com/todos/1";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Awaiting with no stream attached buffers and parses the body.
    let settled = request_shim::get((URL, Options::new().json(true)))?.await?;
    if let Settled::Buffered(response) = settled {
        let todo: Todo = response.body().deserialize()?;
        println!(
            "Todo #{id} for user #{user}: {title} (completed: {completed})",
            id = todo.id,
            user = todo.user_id,
            title = todo.title,
            completed = todo.completed
        );
    }

    // The same call, callback style.
    request_shim::get_with_callback(URL, |outcome| match outcome {
        Ok(response) => println!("callback: {} from {}", response.status_code(), response.url()),
        Err(err) => eprintln!("callback: {err}"),
    })
    .await?;

    Ok(())
}
