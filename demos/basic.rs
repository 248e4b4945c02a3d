//! Minimal wsengine service: a couple of actions, health checks, translations.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl 'http://localhost:3000/api/greetings/hello?name=alice'
//!   curl 'http://localhost:3000/api/greetings/hello.json?name=alice&style=loud'
//!   curl 'http://localhost:3000/api/greetings/hello?style=shy'
//!   curl -X POST -d 'name=bob' http://localhost:3000/api/greetings/forget
//!   curl -H 'accept-language: fr' -X POST -d 'name=nobody' http://localhost:3000/api/greetings/forget
//!   curl http://localhost:3000/api/health/liveness

use tracing_subscriber::EnvFilter;
use wsengine::{
    ActionRequest, Context, DefinitionError, Engine, Errors, Message, Response, Server,
    StaticMessages, WsError, health::HealthWs,
};

#[tokio::main]
async fn main() -> Result<(), wsengine::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let messages = StaticMessages::new()
        .with("en", "greetings.unknown", "Nobody called {0} was ever greeted")
        .with("fr", "greetings.unknown", "Personne du nom de {0} n'a été salué");

    let engine = Engine::builder()
        .service(greetings)
        .service(HealthWs)
        .i18n(messages)
        .build();

    Server::bind("0.0.0.0:3000")?.serve(engine).await
}

fn greetings(ctx: &mut Context) -> Result<(), DefinitionError> {
    let mut controller = ctx.create_controller("api/greetings");
    controller.set_description("Say hello").set_since("0.1");

    let hello = controller.create_action("hello");
    hello.create_param("name").set_required(true).set_description("Who to greet");
    hello
        .create_param("style")
        .set_default_value("plain")
        .set_possible_values(["plain", "loud"]);
    hello.set_handler(say_hello);

    let forget = controller.create_action("forget");
    forget.create_param("name").set_required(true);
    forget.set_post(true).set_handler(forget_name);

    controller.done()
}

// GET /api/greetings/hello?name=...&style=plain|loud
fn say_hello(req: &ActionRequest<'_>, res: &mut Response) -> Result<(), WsError> {
    let name = req.mandatory_param("name")?;
    let greeting = match req.param_or("style", "plain")? {
        "loud" => format!("HELLO, {}!", name.to_uppercase()),
        _ => format!("Hello, {name}."),
    };
    let body = serde_json::to_vec(&serde_json::json!({ "greeting": greeting }))
        .map_err(WsError::unexpected)?;
    res.write_body(&body)
}

// POST /api/greetings/forget  name=...
fn forget_name(req: &ActionRequest<'_>, res: &mut Response) -> Result<(), WsError> {
    let name = req.mandatory_param("name")?;
    if name == "nobody" {
        return Err(Errors::from(Message::key("greetings.unknown", [name])).into());
    }
    res.no_content();
    Ok(())
}
