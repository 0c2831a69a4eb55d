use crate::core::Session;
use crate::core::file::format_bytes;
use colored::Colorize;
use comfy_table::Table;

pub fn display_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn display_error(message: &str) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}

pub fn display_warning(message: &str) {
    eprintln!("{} {}", "Warning:".yellow().bold(), message);
}

pub fn display_info(message: &str) {
    println!("{}", message.dimmed());
}

/// Table describing a freshly created drop and where to fetch it
pub fn drop_summary(session: &Session, lan_url: &str, alias_url: Option<&str>) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["", "Drop"]);
    table.add_row(vec!["File", session.file_name.as_str()]);
    table.add_row(vec!["Size".to_string(), format_bytes(session.file_size)]);
    table.add_row(vec!["Type", session.mime_type.as_str()]);
    table.add_row(vec!["Expires".to_string(), session.expires_at.to_rfc3339()]);
    table.add_row(vec!["URL", lan_url]);
    if let Some(alias_url) = alias_url {
        table.add_row(vec!["Alias", alias_url]);
    }
    table
}

pub fn display_drop(session: &Session, lan_url: &str, alias_url: Option<&str>) {
    println!();
    display_success("Drop created successfully!");
    println!("{}", drop_summary(session, lan_url, alias_url));
    println!("\n{} {}", "URL:".bold(), lan_url.cyan().underline());
    if let Some(alias_url) = alias_url {
        println!("{} {}", "Alias:".bold(), alias_url.cyan().underline());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_drop_summary_lists_urls() {
        let session = Session::new(
            "calm-moon-512",
            "notes.txt",
            "text/plain",
            Bytes::from_static(b"hello"),
            chrono::Utc::now(),
        );

        let rendered = drop_summary(&session, "http://192.168.1.20:8080/calm-moon-512", None)
            .to_string();
        assert!(rendered.contains("notes.txt"));
        assert!(rendered.contains("5 B"));
        assert!(!rendered.contains("Alias"));

        let rendered = drop_summary(
            &session,
            "http://192.168.1.20:8080/",
            Some("http://drop.local:8080/"),
        )
        .to_string();
        assert!(rendered.contains("http://drop.local:8080/"));
    }
}
