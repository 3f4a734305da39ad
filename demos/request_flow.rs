//! Request flow demonstration.
//!
//! This example walks one browser through a small CMS:
//! 1. Anonymous GET receives a session cookie and a masked token
//! 2. Login posts the token back with credentials
//! 3. The editor updates their own page
//! 4. A forged POST without a token is refused
//! 5. Logout clears the cookie
//!
//! Run with: `cargo run --example request_flow`

use std::sync::Arc;

use cms_guard::audit::AuditTrail;
use cms_guard::web::example_handler::{
    handle_edit_form, handle_index, handle_login, handle_logout, handle_update, Page,
};
use cms_guard::web::{Guard, HttpMethod, RequestAdapter};
use cms_guard::{
    hash_password, register_default_abilities, Config, MemoryStore, Registry, Role, UserRecord, Verb,
};

struct Client {
    cookie: Option<String>,
    counter: u32,
}

impl Client {
    fn request(&mut self, method: HttpMethod, path: &str) -> RequestAdapter {
        self.counter += 1;
        let mut request = RequestAdapter::new(format!("demo-{}", self.counter), method, path);
        if let Some(cookie) = &self.cookie {
            request.add_cookie("cms_session", cookie.clone());
        }
        request
    }

    fn keep(&mut self, set_cookies: &[String]) {
        for header in set_cookies {
            println!("  Set-Cookie: {}", header);
            if let Some(rest) = header.strip_prefix("cms_session=") {
                let value = rest.split(';').next().unwrap_or_default();
                self.cookie = (!value.is_empty()).then(|| value.to_string());
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(true)
        .init();

    println!("=== Request Flow Example ===\n");

    let (hmac_key, aead_key) = Config::generate_keys();
    let config = Config::parse(&format!(
        "hmac_key = \"{hmac_key}\"\naead_key = \"{aead_key}\"\nsession_name = \"cms_session\"\n"
    ))
    .expect("generated config is valid");

    let registry = Registry::new();
    register_default_abilities(&registry);
    registry.authorize(Role::ANON, Verb::List, "pages");
    registry.authorize(Role::EDITOR, Verb::List, "pages");
    registry.authorize_owner(Role::EDITOR, Verb::Update, "pages");

    let store = MemoryStore::new();
    store.insert(UserRecord::new(
        1,
        Role::EDITOR,
        "editor@example.com",
        hash_password("hunter22").expect("hashing works"),
    ));

    let trail = Arc::new(AuditTrail::new());
    let guard = Guard::from_config(&config, Arc::new(registry), Arc::new(store))
        .expect("config validates")
        .with_audit(Arc::clone(&trail));

    let mut page = Page {
        id: 1,
        author_id: 1,
        title: "Welcome".to_string(),
    };
    let mut client = Client {
        cookie: None,
        counter: 0,
    };

    // Scenario 1: anonymous index
    println!("--- Scenario 1: Anonymous GET /pages ---");
    let mut request = client.request(HttpMethod::Get, "/pages");
    let rendered = handle_index(&guard, &mut request, std::slice::from_ref(&page));
    println!("  status {}", rendered.status);
    client.keep(&rendered.set_cookies);
    let token = request.context().authenticity_token().unwrap_or_default().to_string();

    // Scenario 2: login
    println!("\n--- Scenario 2: POST /users/login ---");
    let mut request = client.request(HttpMethod::Post, "/users/login");
    request.add_form_field("authenticity_token", token);
    request.add_form_field("email", "editor@example.com");
    request.add_form_field("password", "hunter22");
    let rendered = handle_login(&guard, &mut request);
    println!("  status {} body {:?}", rendered.status, rendered.body);
    client.keep(&rendered.set_cookies);

    // Scenario 3: edit own page
    println!("\n--- Scenario 3: Edit own page ---");
    let mut request = client.request(HttpMethod::Get, "/pages/1/update");
    let rendered = handle_edit_form(&guard, &mut request, &page);
    println!("  form status {}", rendered.status);
    let token = request.context().authenticity_token().unwrap_or_default().to_string();

    let mut request = client.request(HttpMethod::Post, "/pages/1/update");
    request.add_form_field("authenticity_token", token);
    request.add_form_field("title", "Hello, world");
    let rendered = handle_update(&guard, &mut request, &mut page);
    println!("  update status {} title now {:?}", rendered.status, page.title);

    // Scenario 4: forged POST
    println!("\n--- Scenario 4: POST without a token ---");
    let mut request = client.request(HttpMethod::Post, "/pages/1/update");
    request.add_form_field("title", "defaced");
    let rendered = handle_update(&guard, &mut request, &mut page);
    println!("  status {} body {:?}", rendered.status, rendered.body);
    client.keep(&rendered.set_cookies);

    // Scenario 5: logout (the refused POST already cleared the session)
    println!("\n--- Scenario 5: Logout ---");
    let mut request = client.request(HttpMethod::Get, "/pages");
    let rendered = handle_index(&guard, &mut request, &[]);
    client.keep(&rendered.set_cookies);
    let token = request.context().authenticity_token().unwrap_or_default().to_string();

    let mut request = client.request(HttpMethod::Post, "/users/logout");
    request.add_form_field("authenticity_token", token);
    let rendered = handle_logout(&guard, &mut request);
    println!("  status {}", rendered.status);
    client.keep(&rendered.set_cookies);

    println!("\n=== Audit Trail ({} events) ===", trail.len());
    for event in trail.events() {
        println!("  {}", event);
    }
}
