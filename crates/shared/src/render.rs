use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::models::Digest;

pub struct DigestRenderer;

impl DigestRenderer {
    fn format_date(date: NaiveDate) -> String {
        // "July 28, 2024"
        date.format("%B %-d, %Y").to_string()
    }

    fn format_generated(at: DateTime<Utc>) -> String {
        let local = at.with_timezone(&Local);
        format!(
            "Generated on {} at {}",
            local.format("%B %-d, %Y"),
            local.format("%-I:%M %p")
        )
    }

    pub fn html(digest: &Digest) -> String {
        let mut html = String::new();

        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("  <meta charset=\"UTF-8\">\n");
        html.push_str(&format!(
            "  <title>{}</title>\n",
            Self::escape_html(&digest.subject)
        ));
        html.push_str("  <style>\n");
        html.push_str("    body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }\n");
        html.push_str("    h1 { color: #2c3e50; border-bottom: 3px solid #d2691e; padding-bottom: 10px; text-align: center; }\n");
        html.push_str("    .intro { font-size: 16px; margin-bottom: 20px; }\n");
        html.push_str("    .item { margin-bottom: 20px; padding: 15px; border-left: 4px solid #d2691e; background-color: #fafafa; }\n");
        html.push_str("    .summary { font-size: 16px; margin-bottom: 8px; }\n");
        html.push_str("    .metadata { font-size: 12px; color: #666; margin-bottom: 5px; }\n");
        html.push_str("    .link { color: #d2691e; text-decoration: none; font-weight: bold; }\n");
        html.push_str("    .footer { margin-top: 30px; padding-top: 20px; border-top: 1px solid #eee; text-align: center; color: #666; font-size: 12px; }\n");
        html.push_str("    .unsubscribe { margin-top: 15px; font-size: 11px; }\n");
        html.push_str("  </style>\n");
        html.push_str("</head>\n<body>\n");

        html.push_str(&format!(
            "<h1>{}</h1>\n",
            Self::escape_html(&digest.subject)
        ));
        html.push_str(&format!(
            "<p class=\"intro\">{}</p>\n",
            Self::escape_html(&digest.intro)
        ));

        for (index, item) in digest.items.iter().enumerate() {
            html.push_str("<div class=\"item\">\n");
            html.push_str(&format!(
                "  <div class=\"summary\"><strong>{}.</strong> {}</div>\n",
                index + 1,
                Self::escape_html(item.display_text())
            ));
            html.push_str(&format!(
                "  <div class=\"metadata\">Date: {} &middot; {}</div>\n",
                Self::format_date(item.published_date),
                Self::escape_html(&item.source_name)
            ));
            html.push_str(&format!(
                "  <div><a href=\"{}\" class=\"link\">&gt;&gt; Read full article</a></div>\n",
                Self::escape_html(&item.url)
            ));
            html.push_str("</div>\n");
        }

        html.push_str("<div class=\"footer\">\n");
        html.push_str("  <p>This digest was automatically generated from multiple sumo news sources</p>\n");
        html.push_str(&format!(
            "  <p>{}</p>\n",
            Self::format_generated(digest.created_at)
        ));
        html.push_str("  <p class=\"unsubscribe\">To unsubscribe from these emails, please reply with \"UNSUBSCRIBE\" or contact the sender.</p>\n");
        html.push_str("</div>\n");

        html.push_str("</body>\n</html>");
        html
    }

    pub fn text(digest: &Digest) -> String {
        let mut text = String::new();

        text.push_str("SUMO WRESTLING NEWS DIGEST\n\n");
        text.push_str(&digest.intro);
        text.push_str("\n\n");

        let items = digest
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                format!(
                    "{}. {}\n   Date: {}\n   Link: {}",
                    index + 1,
                    item.display_text(),
                    Self::format_date(item.published_date),
                    item.url
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        text.push_str(&items);

        text.push_str("\n\n---\n");
        text.push_str("This digest was automatically generated from multiple sumo news sources\n");
        text.push_str(&Self::format_generated(digest.created_at));
        text.push_str("\n\nTo unsubscribe: Reply with \"UNSUBSCRIBE\" or contact the sender.\n");
        text
    }

    pub fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }
}
