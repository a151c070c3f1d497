//! Server-rendered pages: the login form and the employee table.

use std::fmt::Write as _;

use products_directory::{Employee, Headcount};

/// Escapes text for use in element content and quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape(title),
        body
    )
}

pub fn login_page(error: Option<&str>) -> String {
    let mut body = String::from("<h1>Staff directory</h1>\n");
    if let Some(message) = error {
        let _ = writeln!(body, "<p class=\"error\">{}</p>", escape(message));
    }
    body.push_str(
        "<form method=\"post\" action=\"/login\">\n\
         <label>Username <input name=\"username\" autocomplete=\"username\"></label>\n\
         <label>Password <input name=\"password\" type=\"password\" autocomplete=\"current-password\"></label>\n\
         <button type=\"submit\">Sign in</button>\n\
         </form>\n",
    );
    page("Sign in", &body)
}

pub struct DirectoryView<'a> {
    pub username: &'a str,
    pub employees: &'a [Employee],
    pub search: Option<&'a str>,
}

pub fn directory_page(view: &DirectoryView<'_>) -> String {
    let counts = Headcount::of(view.employees);
    let mut body = String::new();
    let _ = writeln!(
        body,
        "<header><span>{}</span> <a href=\"/logout\">Sign out</a></header>",
        escape(view.username)
    );
    let _ = writeln!(
        body,
        "<form method=\"get\" action=\"/search\"><input name=\"q\" value=\"{}\"> \
         <button type=\"submit\">Search</button></form>",
        escape(view.search.unwrap_or_default())
    );
    let _ = writeln!(
        body,
        "<p>Total: {} &middot; Active: {}</p>",
        counts.total, counts.active
    );
    body.push_str(
        "<table>\n<thead><tr><th>#</th><th>Name</th><th>Position</th><th>Phone</th>\
         <th>Email</th><th>Building</th><th>Status</th><th>Comments</th></tr></thead>\n<tbody>\n",
    );
    for (index, employee) in view.employees.iter().enumerate() {
        let _ = writeln!(
            body,
            "<tr data-id=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td>{}</td><td>{}</td><td>{}</td></tr>",
            employee.id,
            index + 1,
            escape(&employee.full_name()),
            escape(&employee.position),
            escape(&employee.phone),
            escape(employee.email.as_deref().unwrap_or_default()),
            employee.building.as_str(),
            employee.status.as_str(),
            escape(employee.comments.as_deref().unwrap_or_default()),
        );
    }
    body.push_str("</tbody>\n</table>\n");
    page("Staff directory", &body)
}
