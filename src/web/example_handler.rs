//! Example handlers showing how a CMS wires the guard into its actions.
//!
//! **These examples are for documentation and testing only.** They render
//! plain strings instead of templates and keep pages in memory.

use crate::authorize::Verb;
use crate::error::Error;
use crate::resource::{Kind, Resource};

use super::{Guard, RequestAdapter, ResponseAdapter};

/// A content page, owned by its author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Page id
    pub id: u64,
    /// Id of the user who wrote it
    pub author_id: u64,
    /// Page title
    pub title: String,
}

impl Resource for Page {
    fn kind(&self) -> &str {
        "pages"
    }

    fn owned_by(&self, user_id: u64) -> bool {
        user_id != 0 && self.author_id == user_id
    }
}

/// What a handler sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// HTTP status
    pub status: u16,
    /// Response body
    pub body: String,
    /// `Set-Cookie` header values
    pub set_cookies: Vec<String>,
}

/// Turns a handler result into a response.
///
/// Errors become their fixed status and public message; details go to the
/// request log only.
pub fn respond(request: &RequestAdapter, response: &ResponseAdapter, result: Result<String, Error>) -> Rendered {
    match result {
        Ok(body) => Rendered {
            status: 200,
            body,
            set_cookies: response.set_cookie_headers(),
        },
        Err(err) => {
            let status = err.status();
            if status >= 500 {
                request.log().error(format_args!("request failed: {}", err));
            } else {
                request.log().info(format_args!("request refused: {}", err));
            }
            Rendered {
                status,
                body: err.public_message().to_string(),
                set_cookies: response.set_cookie_headers(),
            }
        }
    }
}

/// Escapes text for use in HTML content and quoted attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// GET /pages: anyone allowed to list pages sees the titles.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use cms_guard::{MemoryStore, Registry, Role, SessionCodec, SessionSettings, Verb};
/// use cms_guard::web::{Guard, HttpMethod, RequestAdapter};
/// use cms_guard::web::example_handler::{handle_index, Page};
///
/// let registry = Registry::new();
/// registry.authorize(Role::ANON, Verb::List, "pages");
/// let codec = SessionCodec::new(SessionSettings::new([1; 32], [2; 32], "app_session"));
/// let guard = Guard::new(codec, Arc::new(registry), Arc::new(MemoryStore::new()));
///
/// let pages = vec![Page { id: 1, author_id: 1, title: "Home".to_string() }];
/// let mut request = RequestAdapter::new("req-1", HttpMethod::Get, "/pages");
///
/// let rendered = handle_index(&guard, &mut request, &pages);
/// assert_eq!(rendered.status, 200);
/// assert!(rendered.body.contains("Home"));
/// ```
pub fn handle_index(guard: &Guard, request: &mut RequestAdapter, pages: &[Page]) -> Rendered {
    let mut response = ResponseAdapter::new();
    let result = (|| -> Result<String, Error> {
        let admission = guard.admit(request, &mut response)?;
        guard.authorize(&admission, request, Verb::List, Some(&Kind("pages")))?;
        let titles: Vec<String> = pages.iter().map(|p| escape_html(&p.title)).collect();
        Ok(titles.join("\n"))
    })();
    respond(request, &response, result)
}

/// GET /pages/{id}/update: renders the edit form with a fresh token.
pub fn handle_edit_form(guard: &Guard, request: &mut RequestAdapter, page: &Page) -> Rendered {
    let mut response = ResponseAdapter::new();
    let result = (|| -> Result<String, Error> {
        let admission = guard.admit(request, &mut response)?;
        guard.authorize(&admission, request, Verb::Update, Some(page))?;
        let token = request.context().authenticity_token().unwrap_or_default();
        Ok(format!(
            "<form method=\"post\" action=\"/pages/{}/update\">\
             <input type=\"hidden\" name=\"authenticity_token\" value=\"{}\">\
             <input name=\"title\" value=\"{}\"></form>",
            page.id,
            escape_html(token),
            escape_html(&page.title)
        ))
    })();
    respond(request, &response, result)
}

/// POST /pages/{id}/update: changes the title if the token and ability allow.
pub fn handle_update(guard: &Guard, request: &mut RequestAdapter, page: &mut Page) -> Rendered {
    let mut response = ResponseAdapter::new();
    let result = (|| -> Result<String, Error> {
        let admission = guard.admit(request, &mut response)?;
        guard.authorize(&admission, request, Verb::Update, Some(&*page))?;
        if let Some(title) = request.form_value("title") {
            page.title = title.to_string();
        }
        request.log().info(format_args!("updated page {}", page.id));
        Ok(format!("updated {}", page.id))
    })();
    respond(request, &response, result)
}

/// POST /users/login: checks credentials from the form.
pub fn handle_login(guard: &Guard, request: &mut RequestAdapter) -> Rendered {
    let mut response = ResponseAdapter::new();
    let result = (|| -> Result<String, Error> {
        let admission = guard.admit(request, &mut response)?;
        let email = request.form_value("email").unwrap_or_default().to_string();
        let password = request.form_value("password").unwrap_or_default().to_string();
        let principal = guard.login(&admission, request, &mut response, &email, &password)?;
        Ok(format!("welcome {}", principal.id()))
    })();
    respond(request, &response, result)
}

/// POST /users/logout: drops the session.
pub fn handle_logout(guard: &Guard, request: &mut RequestAdapter) -> Rendered {
    let mut response = ResponseAdapter::new();
    let result = (|| -> Result<String, Error> {
        let admission = guard.admit(request, &mut response)?;
        guard.logout(&admission, request, &mut response);
        Ok("logged out".to_string())
    })();
    respond(request, &response, result)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::authorize::{register_default_abilities, Registry};
    use crate::config::SessionSettings;
    use crate::password::hash_password;
    use crate::principal::{MemoryStore, Role, UserRecord};
    use crate::session::SessionCodec;
    use crate::token::TOKEN_FIELD;
    use crate::web::HttpMethod;

    fn guard() -> Guard {
        let registry = Registry::new();
        register_default_abilities(&registry);
        registry.authorize_owner(Role::EDITOR, Verb::Update, "pages");

        let store = MemoryStore::new();
        store.insert(UserRecord::new(
            5,
            Role::EDITOR,
            "ed@example.com",
            hash_password("pw").unwrap(),
        ));

        Guard::new(
            SessionCodec::new(SessionSettings::new([5; 32], [6; 32], "s")),
            Arc::new(registry),
            Arc::new(store),
        )
    }

    fn session_cookie(rendered: &Rendered) -> String {
        rendered
            .set_cookies
            .iter()
            .find_map(|c| c.strip_prefix("s="))
            .and_then(|rest| rest.split(';').next())
            .unwrap_or_default()
            .to_string()
    }

    fn login(guard: &Guard) -> String {
        let mut form = RequestAdapter::new("r-login-form", HttpMethod::Get, "/users/login");
        let shown = handle_index(guard, &mut form, &[]);
        let token = form.context().authenticity_token().unwrap().to_string();

        let mut post = RequestAdapter::new("r-login", HttpMethod::Post, "/users/login");
        post.add_cookie("s", session_cookie(&shown));
        post.add_form_field(TOKEN_FIELD, token);
        post.add_form_field("email", "ed@example.com");
        post.add_form_field("password", "pw");
        let rendered = handle_login(guard, &mut post);
        assert_eq!(rendered.status, 200, "{}", rendered.body);
        session_cookie(&rendered)
    }

    #[test]
    fn index_denied_without_ability() {
        let guard = guard();
        let mut request = RequestAdapter::new("r1", HttpMethod::Get, "/pages");
        let rendered = handle_index(&guard, &mut request, &[]);

        assert_eq!(rendered.status, 403);
        assert_eq!(rendered.body, "You are not authorized to do that");
        // token cookie is still set so the next form post can succeed
        assert_eq!(rendered.set_cookies.len(), 1);
    }

    #[test]
    fn owner_can_edit_and_update() {
        let guard = guard();
        let cookie = login(&guard);
        let mut page = Page {
            id: 9,
            author_id: 5,
            title: "Old".to_string(),
        };

        let mut form = RequestAdapter::new("r2", HttpMethod::Get, "/pages/9/update");
        form.add_cookie("s", cookie.clone());
        let shown = handle_edit_form(&guard, &mut form, &page);
        assert_eq!(shown.status, 200);
        let token = form.context().authenticity_token().unwrap().to_string();
        assert!(shown.body.contains(&token));

        let mut post = RequestAdapter::new("r3", HttpMethod::Post, "/pages/9/update");
        post.add_cookie("s", cookie);
        post.add_form_field(TOKEN_FIELD, token);
        post.add_form_field("title", "New");
        let rendered = handle_update(&guard, &mut post, &mut page);

        assert_eq!(rendered.status, 200);
        assert_eq!(page.title, "New");
    }

    #[test]
    fn non_owner_cannot_update() {
        let guard = guard();
        let cookie = login(&guard);
        let mut page = Page {
            id: 9,
            author_id: 6,
            title: "Theirs".to_string(),
        };

        let mut form = RequestAdapter::new("r2", HttpMethod::Get, "/pages");
        form.add_cookie("s", cookie.clone());
        handle_index(&guard, &mut form, &[]);
        let token = form.context().authenticity_token().unwrap().to_string();

        let mut post = RequestAdapter::new("r3", HttpMethod::Post, "/pages/9/update");
        post.add_cookie("s", cookie);
        post.add_form_field(TOKEN_FIELD, token);
        post.add_form_field("title", "Mine now");
        let rendered = handle_update(&guard, &mut post, &mut page);

        assert_eq!(rendered.status, 403);
        assert_eq!(page.title, "Theirs");
    }

    #[test]
    fn update_without_token_clears_session() {
        let guard = guard();
        let cookie = login(&guard);
        let mut page = Page {
            id: 9,
            author_id: 5,
            title: "Old".to_string(),
        };

        let mut post = RequestAdapter::new("r3", HttpMethod::Post, "/pages/9/update");
        post.add_cookie("s", cookie);
        post.add_form_field("title", "New");
        let rendered = handle_update(&guard, &mut post, &mut page);

        assert_eq!(rendered.status, 403);
        assert_eq!(page.title, "Old");
        assert!(rendered.set_cookies[0].contains("Max-Age=0"));
    }

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#x27;s&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn stored_title_cannot_break_out_of_the_form() {
        let guard = guard();
        let cookie = login(&guard);
        let page = Page {
            id: 9,
            author_id: 5,
            title: "\"><script>alert(1)</script>".to_string(),
        };

        let mut form = RequestAdapter::new("r2", HttpMethod::Get, "/pages/9/update");
        form.add_cookie("s", cookie);
        let shown = handle_edit_form(&guard, &mut form, &page);

        assert_eq!(shown.status, 200);
        assert!(!shown.body.contains("<script>"));
        assert!(shown
            .body
            .contains(r#"<input name="title" value="&quot;&gt;&lt;script&gt;alert(1)&lt;/script&gt;">"#));
    }

    #[test]
    fn index_escapes_titles() {
        let registry = Registry::new();
        registry.authorize(Role::ANON, Verb::List, "pages");
        let guard = Guard::new(
            SessionCodec::new(SessionSettings::new([5; 32], [6; 32], "s")),
            Arc::new(registry),
            Arc::new(MemoryStore::new()),
        );
        let pages = vec![Page {
            id: 1,
            author_id: 1,
            title: "<b>bold</b>".to_string(),
        }];

        let mut request = RequestAdapter::new("r1", HttpMethod::Get, "/pages");
        let rendered = handle_index(&guard, &mut request, &pages);

        assert_eq!(rendered.status, 200);
        assert_eq!(rendered.body, "&lt;b&gt;bold&lt;/b&gt;");
    }

    #[test]
    fn wrong_password_is_unauthorized() {
        let guard = guard();
        let mut form = RequestAdapter::new("r1", HttpMethod::Get, "/users/login");
        let shown = handle_index(&guard, &mut form, &[]);
        let token = form.context().authenticity_token().unwrap().to_string();

        let mut post = RequestAdapter::new("r2", HttpMethod::Post, "/users/login");
        post.add_cookie("s", session_cookie(&shown));
        post.add_form_field(TOKEN_FIELD, token);
        post.add_form_field("email", "ed@example.com");
        post.add_form_field("password", "nope");
        let rendered = handle_login(&guard, &mut post);

        assert_eq!(rendered.status, 401);
        assert!(rendered.set_cookies.is_empty());
    }
}
