#[tokio::main]
async fn main() {
    workshop_backend::run().await;
}
