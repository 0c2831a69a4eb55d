//! HTML pages and the shared stylesheet served by the router.

use crate::config::ServerConfig;
use crate::core::Session;
use crate::core::file::format_bytes;
use crate::protocol::{APP_NAME, STYLESHEET_PATH, UPLOAD_PATH};
use chrono::{DateTime, Utc};

pub const STYLESHEET: &str = r#":root {
  --bg: #f6f5f2;
  --card: #ffffff;
  --ink: #1f2328;
  --muted: #6b7280;
  --accent: #2f6fed;
  --danger: #c2410c;
}
* { box-sizing: border-box; }
body {
  margin: 0;
  min-height: 100vh;
  display: flex;
  align-items: center;
  justify-content: center;
  background: var(--bg);
  color: var(--ink);
  font-family: system-ui, -apple-system, "Segoe UI", sans-serif;
}
main { width: min(560px, 92vw); }
.card {
  background: var(--card);
  border-radius: 14px;
  padding: 28px;
  box-shadow: 0 10px 30px rgba(0, 0, 0, 0.06);
}
h1 { margin: 0 0 8px; font-size: 1.6rem; }
.muted { color: var(--muted); }
.file-name { font-weight: 600; word-break: break-all; }
.countdown { font-variant-numeric: tabular-nums; font-size: 2rem; margin: 16px 0 4px; }
.button {
  display: inline-block;
  margin-top: 18px;
  padding: 12px 22px;
  border-radius: 10px;
  background: var(--accent);
  color: #fff;
  text-decoration: none;
  font-weight: 600;
  border: 0;
  cursor: pointer;
}
.dropzone {
  margin-top: 18px;
  padding: 32px;
  border: 2px dashed #cbd5e1;
  border-radius: 12px;
  text-align: center;
}
.dropzone.active { border-color: var(--accent); }
.error { color: var(--danger); }
footer { margin-top: 18px; font-size: 0.85rem; }
"#;

const COUNTDOWN_SCRIPT: &str = r#"<script>
(function () {
  var el = document.querySelector('[data-expires-at]');
  var out = document.querySelector('[data-countdown]');
  if (!el || !out) return;
  var expiresAt = Number(el.getAttribute('data-expires-at'));
  var pad = function (n) { return String(n).padStart(2, '0'); };
  var tick = function () {
    var left = expiresAt - Date.now();
    if (left <= 0) {
      out.textContent = '00:00';
      var hint = document.querySelector('[data-hint]');
      if (hint) hint.textContent = 'This drop has expired.';
      return;
    }
    var s = Math.floor(left / 1000);
    var h = Math.floor(s / 3600);
    var text = pad(Math.floor(s / 60) % 60) + ':' + pad(s % 60);
    out.textContent = h > 0 ? pad(h) + ':' + text : text;
    setTimeout(tick, 1000);
  };
  tick();
})();
</script>"#;

const UPLOAD_SCRIPT: &str = r#"<script>
(function () {
  var zone = document.querySelector('[data-upload-card] .dropzone');
  var input = document.querySelector('[data-upload-card] input[type=file]');
  var status = document.querySelector('[data-upload-status]');
  if (!zone || !input || !status) return;
  var send = function (files) {
    if (!files.length) return;
    var form = new FormData();
    var first = files[0].webkitRelativePath || '';
    var dir = first.indexOf('/') > 0 ? first.split('/')[0] : '';
    for (var i = 0; i < files.length; i++) {
      form.append('file', files[i], files[i].webkitRelativePath || files[i].name);
    }
    if (dir) form.set('directoryName', dir);
    status.textContent = 'Uploading...';
    fetch(zone.getAttribute('data-action'), { method: 'POST', body: form })
      .then(function (r) { if (!r.ok) throw new Error(r.status); return r.json(); })
      .then(function (p) { window.location.href = '/' + encodeURIComponent(p.slug); })
      .catch(function (e) { status.textContent = 'Upload failed (' + e.message + ')'; });
  };
  input.addEventListener('change', function () { send(input.files); });
  zone.addEventListener('dragover', function (e) { e.preventDefault(); zone.classList.add('active'); });
  zone.addEventListener('dragleave', function () { zone.classList.remove('active'); });
  zone.addEventListener('drop', function (e) {
    e.preventDefault();
    zone.classList.remove('active');
    send(e.dataTransfer.files);
  });
})();
</script>"#;

/// Escape text for use in HTML bodies and double-quoted attributes
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{title}</title>
  <link rel="stylesheet" href="{css}">
</head>
<body>
<main>
{body}
</main>
</body>
</html>"#,
        title = escape_html(title),
        css = STYLESHEET_PATH,
        body = body,
    )
}

/// Page at `/` when no session is bound to the root slot
pub fn landing_page(config: &ServerConfig, now: DateTime<Utc>) -> String {
    let upload_card = if config.allow_uploads {
        let expires_at = now
            + chrono::Duration::from_std(config.duration).unwrap_or(chrono::Duration::zero());
        format!(
            r#"<section data-upload-card data-duration-ms="{duration}" data-expires-at="{expires}">
  <div class="dropzone" data-action="{action}">
    <p>Drag a file or folder here, or</p>
    <label class="button">Choose files<input type="file" name="file" multiple hidden></label>
  </div>
  <p class="muted" data-upload-status>Uploads stay available for {human}.</p>
</section>
{script}"#,
            duration = config.duration.as_millis(),
            expires = expires_at.timestamp_millis(),
            action = UPLOAD_PATH,
            human = escape_html(&human_duration(config.duration)),
            script = UPLOAD_SCRIPT,
        )
    } else {
        r#"<p class="muted">Use the CLI to share files: <code>lan-drop -f &lt;file&gt; -t &lt;time&gt;</code></p>"#
            .to_string()
    };

    let body = format!(
        r#"<div class="card" data-drop-root="1">
  <h1>{app}</h1>
  <p class="muted">Ephemeral file sharing on your local network.</p>
  {upload_card}
</div>"#,
        app = APP_NAME,
        upload_card = upload_card,
    );
    layout(APP_NAME, &body)
}

/// Interstitial shown before the byte transfer; `download_href` carries the marker
pub fn download_page(session: &Session, download_href: &str, now: DateTime<Utc>) -> String {
    let remaining = session.remaining_at(now);
    let body = format!(
        r#"<div class="card" data-expires-at="{expires}">
  <h1>Ready to download</h1>
  <p class="file-name">{name}</p>
  <p class="muted">{size} &middot; {mime}</p>
  <div class="countdown" data-countdown>{left}</div>
  <p class="muted" data-hint>Time left before this drop disappears.</p>
  <a class="button" href="{href}" download>Download</a>
  <footer class="muted">Now try it yourself: install {app} on your machine.</footer>
</div>
{script}"#,
        expires = session.expires_at.timestamp_millis(),
        name = escape_html(&session.file_name),
        size = format_bytes(session.file_size),
        mime = escape_html(&session.mime_type),
        left = clock_face(remaining),
        href = escape_html(download_href),
        app = APP_NAME,
        script = COUNTDOWN_SCRIPT,
    );
    layout(&format!("{} - {}", session.file_name, APP_NAME), &body)
}

pub fn not_found_page() -> String {
    let body = r#"<div class="card">
  <h1>Not found</h1>
  <p class="muted">File not found or expired.</p>
</div>"#;
    layout(&format!("Not found - {}", APP_NAME), body)
}

pub fn expired_page() -> String {
    let body = r#"<div class="card">
  <h1>Expired</h1>
  <p class="error">File has expired.</p>
</div>"#;
    layout(&format!("Expired - {}", APP_NAME), body)
}

fn clock_face(remaining: std::time::Duration) -> String {
    let total = remaining.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

fn human_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3599 => format!("{}m {}s", secs / 60, secs % 60),
        3600..=86_399 => format!("{}h {}m", secs / 3600, (secs / 60) % 60),
        _ => format!("{}d {}h", secs / 86_400, (secs / 3600) % 24),
    }
}
