use fairydust_api::{Client, DustApiError, Request};

#[tokio::main]
pub async fn main() -> Result<(), DustApiError> {
    let client = Client::new("http://localhost:8001");

    let req = Request::users().balance();

    let res = client.send(req, Some("access_token")).await?;
    println!("balance: {}", res.balance);
    Ok(())
}
