//! Static result pages served by the OAuth callback.

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body { margin: 0; min-height: 100vh; display: grid; place-items: center; background: #2b2d31; color: #f2f3f5; font-family: "Helvetica Neue", Helvetica, Arial, sans-serif; }
main { background: #313338; padding: 40px 48px; border-radius: 10px; box-shadow: 0 4px 14px rgba(0, 0, 0, 0.3); text-align: center; }
h1 { color: {accent}; }
</style>
</head>
<body>
<main>
"#;
const PAGE_TAIL: &str = "</main>\n</body>\n</html>\n";

/// Page shown when the badge was granted.
pub fn success(username: &str) -> String {
	render(
		"Success!",
		"#43b581",
		&format!(
			"<h1>Success!</h1>\n<p>Your roles have been linked, {}.</p>\n<p>You can now close this tab.</p>\n",
			escape_html(username)
		),
	)
}

/// Page shown when no tracked role is held.
pub fn failure() -> String {
	render(
		"Verification Failed",
		"#f04747",
		"<h1>Verification Failed</h1>\n<p>You do not have any of the required roles in the server.</p>\n<p>You can close this tab.</p>\n",
	)
}

/// Page shown when roles could not be checked or the metadata push failed.
pub fn error() -> String {
	render(
		"Verification Error",
		"#faa61a",
		"<h1>Verification Error</h1>\n<p>We could not update your linked roles right now.</p>\n<p>Please try again later from /login.</p>\n",
	)
}

fn render(title: &str, accent: &str, body: &str) -> String {
	let mut page = PAGE_HEAD.replace("{title}", title).replace("{accent}", accent);

	page.push_str(body);
	page.push_str(PAGE_TAIL);

	page
}

/// Escapes text for safe interpolation into HTML element content.
pub fn escape_html(raw: &str) -> String {
	let mut escaped = String::with_capacity(raw.len());

	for c in raw.chars() {
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
