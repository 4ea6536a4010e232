// src/handlers/history_page.rs
//! Server-rendered history dashboard.

use crate::columns::{TableConfig, TableRegistry};
use crate::filters::{DatePreset, FilterState, FROM_KEY, TO_KEY};
use crate::models::{FilterKind, Message};
use crate::view::HistoryView;
use chrono::NaiveDate;

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn history_href(table: &str, filters: &FilterState) -> String {
    let query = filters.to_query_string();
    if query.is_empty() {
        format!("/history/{}", table)
    } else {
        format!("/history/{}?{}", table, query)
    }
}

pub fn render_history_page(
    registry: &TableRegistry,
    table: &TableConfig,
    view: &HistoryView,
    page_size: usize,
    today: NaiveDate,
) -> String {
    format!(
        r###"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{label} - Chat History</title>
    <style>
        * {{ margin: 0; padding: 0; box-sizing: border-box; }}
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #111827; color: #d1d5db; padding: 2rem; }}
        h1 {{ color: white; font-size: 1.9rem; margin-bottom: 1.5rem; }}
        a {{ color: #93c5fd; text-decoration: none; }}
        .tables {{ margin-bottom: 1rem; display: flex; gap: 0.5rem; }}
        .tables a {{ padding: 0.35rem 0.8rem; border-radius: 5px; background: #1f2937; }}
        .tables a.active {{ background: #2563eb; color: white; }}
        .panel {{ background: #1f2937; padding: 1rem; border-radius: 8px; margin-bottom: 1.5rem; }}
        .grid {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 1rem; align-items: end; margin-bottom: 1rem; }}
        label {{ font-size: 0.75rem; color: #9ca3af; display: block; margin-bottom: 0.25rem; }}
        input, select {{ width: 100%; padding: 0.5rem 0.75rem; background: #374151; border: 1px solid #4b5563; border-radius: 6px; color: white; }}
        .presets a {{ display: inline-block; padding: 0.45rem 0.8rem; margin-right: 0.4rem; border-radius: 6px; background: #374151; }}
        .presets a.active {{ background: #2563eb; color: white; }}
        table {{ width: 100%; border-collapse: collapse; font-size: 0.9rem; }}
        th {{ text-align: left; padding: 0.75rem 1.5rem; background: #374151; color: #e5e7eb; text-transform: uppercase; font-size: 0.75rem; }}
        td {{ padding: 0.75rem 1.5rem; vertical-align: top; border-top: 2px solid #111827; }}
        tr.session:hover {{ background: rgba(55, 65, 81, 0.5); }}
        .toggle {{ cursor: pointer; display: flex; gap: 0.5rem; }}
        .chevron {{ color: #9ca3af; width: 1rem; flex-shrink: 0; }}
        tr.detail td {{ padding-left: 4rem; background: #1f2937; }}
        tr.detail[hidden] {{ display: none; }}
        .timestamp {{ font-size: 0.75rem; color: #6b7280; margin-bottom: 0.25rem; }}
        .status {{ text-align: center; padding: 2rem; }}
        .error {{ color: #ef4444; }}
        .pagination {{ display: flex; justify-content: space-between; align-items: center; margin-top: 1rem; }}
        .pagination a, .pagination span.current {{ padding: 0.35rem 0.7rem; border-radius: 5px; background: #1f2937; margin-left: 0.25rem; }}
        .pagination span.current {{ background: #2563eb; color: white; }}
    </style>
</head>
<body>
    <h1>Chat History</h1>
    <nav class="tables">{tables}</nav>
    <div class="panel">
        <form id="filters" method="get" action="/history/{table_name}">
            <input type="hidden" name="preset" value="{preset}">
            <div class="grid">{filter_inputs}</div>
            <div class="grid">
                <div>
                    <label for="from">From</label>
                    <input type="date" id="from" name="from" value="{from}">
                </div>
                <div>
                    <label for="to">To</label>
                    <input type="date" id="to" name="to" value="{to}">
                </div>
                <div class="presets">
                    <label>Quick ranges</label>
                    {presets}
                </div>
            </div>
        </form>
    </div>
    <div class="panel">
        <table>
            <thead>
                <tr>{headers}</tr>
            </thead>
            <tbody>{body}</tbody>
        </table>
    </div>
    {pagination}
    <script>
        // The form carries no page, so any edit starts again from page 1.
        // Only a hand-picked date clears the preset.
        const form = document.getElementById('filters');
        form.addEventListener('change', (event) => {{
            if (event.target.name === 'from' || event.target.name === 'to') {{
                form.elements.namedItem('preset').value = '';
            }}
            for (const field of Array.from(form.elements)) {{
                if (field.name && !field.value) field.disabled = true;
            }}
            form.submit();
        }});
        document.querySelectorAll('[data-toggle]').forEach(cell => {{
            cell.addEventListener('click', () => {{
                const id = cell.getAttribute('data-toggle');
                const rows = document.querySelectorAll('tr.detail[data-session="' + CSS.escape(id) + '"]');
                const expand = rows.length > 0 && rows[0].hidden;
                rows.forEach(row => row.hidden = !expand);
                cell.querySelector('.chevron').textContent = expand ? '▾' : '▸';
            }});
        }});
    </script>
</body>
</html>
"###,
        label = escape_html(&table.spec.label),
        tables = render_table_links(registry, table),
        table_name = escape_html(table.table_name()),
        filter_inputs = render_filter_inputs(table, &view.filters),
        from = escape_html(view.filters.get(FROM_KEY).unwrap_or("")),
        to = escape_html(view.filters.get(TO_KEY).unwrap_or("")),
        preset = view.filters.active_preset().map_or("", |p| p.key()),
        presets = render_presets(table, &view.filters, today),
        headers = render_headers(table),
        body = render_body(table, view),
        pagination = render_pagination(table, view, page_size),
    )
}

fn render_table_links(registry: &TableRegistry, current: &TableConfig) -> String {
    registry
        .iter()
        .map(|t| {
            let class = if t.table_name() == current.table_name() { " class=\"active\"" } else { "" };
            format!(
                "<a href=\"/history/{}\"{}>{}</a>",
                escape_html(t.table_name()),
                class,
                escape_html(&t.spec.label)
            )
        })
        .collect()
}

fn render_filter_inputs(table: &TableConfig, filters: &FilterState) -> String {
    let mut html = String::new();
    for filter in table.filters() {
        let id = escape_html(&filter.id);
        let label = escape_html(&filter.label);
        let current = filters.get(&filter.id).unwrap_or("");
        match filter.kind {
            FilterKind::Text => html.push_str(&format!(
                "<div><input type=\"text\" name=\"{}\" placeholder=\"{}\" value=\"{}\"></div>",
                id,
                label,
                escape_html(current)
            )),
            FilterKind::Select => {
                let options: String = filter
                    .options
                    .iter()
                    .map(|opt| {
                        let selected = if opt.value == current { " selected" } else { "" };
                        format!(
                            "<option value=\"{}\"{}>{}</option>",
                            escape_html(&opt.value),
                            selected,
                            escape_html(&opt.label)
                        )
                    })
                    .collect();
                html.push_str(&format!(
                    "<div><select name=\"{}\"><option value=\"\">{} (All)</option>{}</select></div>",
                    id, label, options
                ));
            }
        }
    }
    html
}

fn render_presets(table: &TableConfig, filters: &FilterState, today: NaiveDate) -> String {
    let active = filters.active_preset();
    DatePreset::ALL
        .iter()
        .map(|preset| {
            let mut next = filters.clone();
            next.apply_preset(*preset, today);
            let class = if active == Some(*preset) { " class=\"active\"" } else { "" };
            format!(
                "<a href=\"{}\"{}>{}</a>",
                escape_html(&history_href(table.table_name(), &next)),
                class,
                preset.label()
            )
        })
        .collect()
}

fn render_headers(table: &TableConfig) -> String {
    let mut html = format!(
        "<th style=\"width: 50%\">{}</th>",
        escape_html(&table.primary_column().header)
    );
    for column in table.other_columns() {
        html.push_str(&format!(
            "<th class=\"{}\">{}</th>",
            escape_html(column.class_name.as_deref().unwrap_or("")),
            escape_html(&column.header)
        ));
    }
    html
}

fn status_row(table: &TableConfig, class: &str, text: &str) -> String {
    format!(
        "<tr><td colspan=\"{}\" class=\"status {}\">{}</td></tr>",
        table.columns.len(),
        class,
        escape_html(text)
    )
}

fn render_body(table: &TableConfig, view: &HistoryView) -> String {
    if let Some(error) = view.error() {
        return status_row(table, "error", error);
    }
    if view.page().is_empty() {
        return status_row(table, "", "No messages match your criteria.");
    }

    let mut html = String::new();
    for (session_id, messages) in view.page().sessions() {
        let expanded = view.is_expanded(session_id);
        html.push_str(&render_session_row(table, session_id, &messages[0], expanded));
        for msg in messages {
            html.push_str(&render_detail_row(table, session_id, msg, expanded));
        }
    }
    html
}

fn render_session_row(table: &TableConfig, session_id: &str, first: &Message, expanded: bool) -> String {
    let primary = table.primary_column();
    let mut html = format!(
        "<tr class=\"session\"><td data-toggle=\"{}\"><div class=\"toggle\"><span class=\"chevron\">{}</span><div>{}</div></div></td>",
        escape_html(session_id),
        if expanded { "▾" } else { "▸" },
        escape_html(&primary.display(first))
    );
    for column in table.other_columns() {
        html.push_str(&format!(
            "<td class=\"{}\">{}</td>",
            escape_html(column.class_name.as_deref().unwrap_or("")),
            escape_html(&column.display(first))
        ));
    }
    html.push_str("</tr>");
    html
}

fn render_detail_row(table: &TableConfig, session_id: &str, msg: &Message, expanded: bool) -> String {
    format!(
        "<tr class=\"detail\" data-session=\"{}\"{}><td colspan=\"{}\"><div class=\"timestamp\">{}</div>{}</td></tr>",
        escape_html(session_id),
        if expanded { "" } else { " hidden" },
        table.columns.len(),
        msg.created_at.format("%d/%m/%Y, %H:%M:%S"),
        escape_html(&table.primary_column().display(msg))
    )
}

fn render_pagination(table: &TableConfig, view: &HistoryView, page_size: usize) -> String {
    let total = view.page().total_session_count;
    let total_pages = view.page().total_pages(page_size);
    if total_pages <= 1 || view.error().is_some() {
        return String::new();
    }

    let current = view.filters.page() as usize;
    let link = |page: usize, text: &str| {
        let mut filters = view.filters.clone();
        filters.set_page(page as u32);
        format!(
            "<a href=\"{}\">{}</a>",
            escape_html(&history_href(table.table_name(), &filters)),
            text
        )
    };

    let first_shown = ((current - 1) * page_size + 1).min(total);
    let last_shown = (current * page_size).min(total);

    let mut links = String::new();
    if current > 1 {
        links.push_str(&link(current - 1, "&laquo; Prev"));
    }
    let window_start = current.saturating_sub(2).max(1);
    let window_end = (window_start + 4).min(total_pages);
    for page in window_start..=window_end {
        if page == current {
            links.push_str(&format!("<span class=\"current\">{}</span>", page));
        } else {
            links.push_str(&link(page, &page.to_string()));
        }
    }
    if current < total_pages {
        links.push_str(&link(current + 1, "Next &raquo;"));
    }

    format!(
        "<div class=\"pagination\"><span>Showing {}-{} of {} sessions</span><div>{}</div></div>",
        first_shown, last_shown, total, links
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paginator::{group_by_session, SessionPage};
    use crate::store::memory::message;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn loaded_view(filters: FilterState, total: usize) -> HistoryView {
        let mut view = HistoryView::new(filters);
        let rows = vec![
            message("1", "s<1>", "2024-03-01T10:00:00Z"),
            message("2", "s<1>", "2024-03-01T10:05:00Z"),
        ];
        let ticket = view.begin_fetch();
        view.complete_fetch(
            ticket,
            Ok(SessionPage {
                session_order: vec!["s<1>".to_string()],
                grouped_messages: group_by_session(rows),
                total_session_count: total,
            }),
        );
        view
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_page_renders_sessions_collapsed_and_escaped() {
        let registry = TableRegistry::builtin();
        let view = loaded_view(FilterState::default(), 1);
        let html = render_history_page(&registry, registry.first(), &view, 15, today());

        assert!(html.contains("data-toggle=\"s&lt;1&gt;\""));
        assert!(html.contains("human: msg 1"));
        assert_eq!(html.matches("<tr class=\"detail\"").count(), 2);
        assert_eq!(html.matches(" hidden>").count(), 2);
        assert!(!html.contains("class=\"pagination\""));
    }

    #[test]
    fn test_expanded_session_shows_detail_rows() {
        let registry = TableRegistry::builtin();
        let mut view = loaded_view(FilterState::default(), 1);
        view.toggle_session("s<1>");
        let html = render_history_page(&registry, registry.first(), &view, 15, today());
        assert_eq!(html.matches(" hidden>").count(), 0);
        assert!(html.contains("01/03/2024, 10:05:00"));
    }

    #[test]
    fn test_error_replaces_results() {
        let registry = TableRegistry::builtin();
        let mut view = loaded_view(FilterState::default(), 1);
        let ticket = view.begin_fetch();
        view.complete_fetch(ticket, Err(crate::error::QueryError::new("relation does not exist")));
        let html = render_history_page(&registry, registry.first(), &view, 15, today());
        assert!(html.contains("class=\"status error\">relation does not exist"));
        assert!(!html.contains("<td data-toggle"));
    }

    #[test]
    fn test_empty_state() {
        let registry = TableRegistry::builtin();
        let mut view = HistoryView::default();
        let ticket = view.begin_fetch();
        view.complete_fetch(ticket, Ok(SessionPage::default()));
        let html = render_history_page(&registry, registry.first(), &view, 15, today());
        assert!(html.contains("No messages match your criteria."));
    }

    #[test]
    fn test_pagination_and_preset_links_keep_filters() {
        let registry = TableRegistry::builtin();
        let filters = FilterState::from_query([("page", "2"), ("session_id", "abc")]);
        let view = loaded_view(filters, 40);
        let html = render_history_page(&registry, registry.first(), &view, 15, today());

        assert!(html.contains("Showing 16-30 of 40 sessions"));
        assert!(html.contains("href=\"/history/chat_messages?session_id=abc\">&laquo; Prev"));
        assert!(html.contains("href=\"/history/chat_messages?page=3&amp;session_id=abc\">Next &raquo;"));
        assert!(html.contains(
            "href=\"/history/chat_messages?from=2024-03-03&amp;preset=7d&amp;session_id=abc&amp;to=2024-03-10\">Last 7 days"
        ));
    }

    #[test]
    fn test_form_carries_active_preset() {
        let registry = TableRegistry::builtin();
        let filters = FilterState::from_query([
            ("from", "2024-03-03"),
            ("to", "2024-03-10"),
            ("preset", "7d"),
            ("session_id", "abc"),
        ]);
        let view = loaded_view(filters, 1);
        let html = render_history_page(&registry, registry.first(), &view, 15, today());
        assert!(html.contains("<input type=\"hidden\" name=\"preset\" value=\"7d\">"));

        let view = loaded_view(FilterState::from_query([("from", "2024-03-03")]), 1);
        let html = render_history_page(&registry, registry.first(), &view, 15, today());
        assert!(html.contains("<input type=\"hidden\" name=\"preset\" value=\"\">"));
    }
}
