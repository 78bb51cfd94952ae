//! Self-contained HTML dashboard.
//!
//! Stat cards and the 80/20 line are rendered here. Charts (Chart.js) and the
//! format and post tables are built in the browser from the report JSON
//! embedded in the page, one account at a time as its tab is opened.

use crate::analytics::AccountReport;
use crate::error::Result;
use crate::format::{format_count, format_percent};
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const CHART_JS_URL: &str = "https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.min.js";

const STYLE: &str = r#"
:root { --bg: #0f1117; --panel: #181b24; --text: #e6e6e6; --muted: #8b90a0; --accent: #7c5cff; --bad: #ff6b6b; }
* { box-sizing: border-box; }
body { margin: 0; padding: 24px; background: var(--bg); color: var(--text); font: 14px/1.5 -apple-system, "Segoe UI", sans-serif; }
h1 { margin: 0 0 4px; font-size: 22px; }
.generated { color: var(--muted); margin-bottom: 20px; }
.tabs { display: flex; gap: 8px; margin-bottom: 20px; flex-wrap: wrap; }
.tab { background: var(--panel); color: var(--muted); border: 1px solid #2a2f3d; border-radius: 6px; padding: 6px 14px; cursor: pointer; }
.tab.active { color: var(--text); border-color: var(--accent); }
.account { display: none; }
.account.active { display: block; }
.cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(160px, 1fr)); gap: 12px; margin-bottom: 20px; }
.card { background: var(--panel); border-radius: 8px; padding: 14px; }
.card .label { color: var(--muted); font-size: 12px; text-transform: uppercase; }
.card .value { font-size: 24px; font-weight: 600; }
.insight { background: var(--panel); border-left: 3px solid var(--accent); padding: 10px 14px; margin-bottom: 20px; }
.charts { display: grid; grid-template-columns: repeat(auto-fit, minmax(360px, 1fr)); gap: 16px; margin-bottom: 20px; }
.chart { background: var(--panel); border-radius: 8px; padding: 14px; }
table { width: 100%; border-collapse: collapse; background: var(--panel); border-radius: 8px; margin-bottom: 20px; }
th, td { text-align: left; padding: 8px 10px; border-bottom: 1px solid #2a2f3d; }
th { color: var(--muted); font-weight: 500; }
td.num { text-align: right; font-variant-numeric: tabular-nums; }
h2 { font-size: 16px; margin: 20px 0 10px; }
h2.bad { color: var(--bad); }
.empty { color: var(--muted); }
"#;

const SCRIPT: &str = r#"
const reports = JSON.parse(document.getElementById('report-data').textContent);
const COLORS = ['#7c5cff', '#4fc3a1', '#5b9bd5', '#ff6b6b', '#e8c37e', '#b58be0'];
const rendered = new Set();

const fmt = (n) => n == null ? '-' : Math.round(Number(n)).toLocaleString();
const pct = (n) => n == null ? '-' : (Number(n) * 100).toFixed(1) + '%';

function options(extra) {
  return Object.assign({
    plugins: { legend: { display: false } },
    scales: { x: { ticks: { color: '#8b90a0' } }, y: { ticks: { color: '#8b90a0' } } }
  }, extra || {});
}

function bar(canvas, labels, values) {
  new Chart(canvas, {
    type: 'bar',
    data: { labels, datasets: [{ data: values, backgroundColor: labels.map((_, i) => COLORS[i % COLORS.length]) }] },
    options: options()
  });
}

function scatter(canvas, points) {
  new Chart(canvas, {
    type: 'scatter',
    data: { datasets: [{ data: points, backgroundColor: '#e8c37e', pointRadius: 6 }] },
    options: options({
      scales: {
        x: { title: { display: true, text: 'Hook score' }, ticks: { color: '#8b90a0' } },
        y: { title: { display: true, text: 'Avg views' }, ticks: { color: '#8b90a0' } }
      }
    })
  });
}

function row(tbody, cells) {
  const tr = document.createElement('tr');
  cells.forEach(([value, numeric, href]) => {
    const td = document.createElement('td');
    if (numeric) td.className = 'num';
    if (href) {
      const a = document.createElement('a');
      a.href = href;
      a.textContent = value;
      td.appendChild(a);
    } else {
      td.textContent = value;
    }
    tr.appendChild(td);
  });
  tbody.appendChild(tr);
}

function postRows(tbody, posts) {
  posts.forEach(p => {
    const hook = (p.hook_text || p.topic || p.post_id).slice(0, 70);
    row(tbody, [
      [p.platform], [hook, false, p.url], [p.format || '-'],
      [fmt(p.views), true], [fmt(p.saves), true], [pct(p.engagement_rate), true]
    ]);
  });
}

function renderAccount(section) {
  const name = section.dataset.account;
  if (rendered.has(name)) return;
  rendered.add(name);
  const report = reports[name];
  if (!report) return;
  const chart = (kind) => section.querySelector('canvas[data-chart="' + kind + '"]');
  const table = (kind) => section.querySelector('tbody[data-table="' + kind + '"]');

  const formats = report.formats;
  const names = formats.map(f => f.name);
  if (chart('views')) bar(chart('views'), names, formats.map(f => Math.round(f.avg_views)));
  if (chart('saves')) bar(chart('saves'), names, formats.map(f => Math.round(f.avg_saves)));
  if (chart('engagement')) bar(chart('engagement'), names, formats.map(f => +(f.avg_engagement_rate * 100).toFixed(1)));
  if (chart('secondary')) {
    if (report.pillars.length > 0) {
      bar(chart('secondary'), report.pillars.map(p => p.name.replace(/_/g, ' ')), report.pillars.map(p => Math.round(p.avg_views)));
    } else {
      scatter(chart('secondary'), report.hook_correlation.map(h => ({ x: h.hook_score, y: h.avg_views })));
    }
  }
  if (chart('slides')) bar(chart('slides'), report.slide_counts.map(s => s.slide_count + ' slides'), report.slide_counts.map(s => Math.round(s.avg_views)));

  if (table('formats')) {
    [...formats].sort((a, b) => b.avg_views - a.avg_views).forEach(f => row(table('formats'), [
      [f.name], [f.post_count, true], [fmt(f.avg_views), true], [fmt(f.avg_saves), true], [pct(f.avg_engagement_rate), true]
    ]));
  }
  if (table('top')) postRows(table('top'), report.top_posts);
  if (table('bottom')) postRows(table('bottom'), report.bottom_posts);
}

function activate(index) {
  document.querySelectorAll('.tab').forEach((t, i) => t.classList.toggle('active', i === index));
  document.querySelectorAll('.account').forEach((s, i) => {
    s.classList.toggle('active', i === index);
    if (i === index) renderAccount(s);
  });
}

document.querySelectorAll('.tab').forEach((t, i) => t.addEventListener('click', () => activate(i)));
if (document.querySelector('.account')) activate(0);
"#;

/// Render the dashboard for every report, keyed and tabbed by account.
pub fn render_dashboard(
    reports: &BTreeMap<String, AccountReport>,
    generated_at: DateTime<Local>,
) -> Result<String> {
    let data = embed_json(&serde_json::to_string(reports)?);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>Carousel Performance Dashboard</title>\n");
    html.push_str(&format!("<script src=\"{CHART_JS_URL}\"></script>\n"));
    html.push_str(&format!("<style>{STYLE}</style>\n</head>\n<body>\n"));
    html.push_str("<h1>Carousel Performance Dashboard</h1>\n");
    html.push_str(&format!(
        "<div class=\"generated\">Generated {}</div>\n",
        generated_at.format("%Y-%m-%d %H:%M")
    ));

    if reports.is_empty() {
        html.push_str("<p class=\"empty\">No accounts to show.</p>\n");
    } else {
        html.push_str("<nav class=\"tabs\">\n");
        for name in reports.keys() {
            html.push_str(&format!(
                "<button class=\"tab\">{}</button>\n",
                escape_html(name)
            ));
        }
        html.push_str("</nav>\n");
        for (name, report) in reports {
            render_account(&mut html, name, report);
        }
    }

    html.push_str(&format!(
        "<script id=\"report-data\" type=\"application/json\">{data}</script>\n"
    ));
    html.push_str(&format!("<script>{SCRIPT}</script>\n</body>\n</html>\n"));
    Ok(html)
}

/// Render and write `dashboard_YYYY-MM-DD_HHMM.html` into `dir`.
pub fn write_dashboard(reports: &BTreeMap<String, AccountReport>, dir: &Path) -> Result<PathBuf> {
    let now = Local::now();
    let html = render_dashboard(reports, now)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("dashboard_{}.html", now.format("%Y-%m-%d_%H%M")));
    std::fs::write(&path, html)?;
    tracing::info!(path = %path.display(), accounts = reports.len(), "Wrote dashboard");
    Ok(path)
}

fn render_account(html: &mut String, name: &str, report: &AccountReport) {
    html.push_str(&format!(
        "<section class=\"account\" data-account=\"{}\">\n",
        escape_html(name)
    ));

    let Some(summary) = report.summary.as_ref().filter(|s| s.total_posts > 0) else {
        html.push_str("<p class=\"empty\">No posts scraped yet.</p>\n</section>\n");
        return;
    };

    html.push_str("<div class=\"cards\">\n");
    let cards = [
        ("Posts", summary.total_posts.to_string()),
        ("Total views", format_count(summary.total_views as f64)),
        ("Avg views", format_count(summary.avg_views)),
        ("Avg engagement", format_percent(summary.avg_engagement_rate)),
        ("Best post", format_count(summary.best_views as f64)),
    ];
    for (label, value) in cards {
        html.push_str(&format!(
            "<div class=\"card\"><div class=\"label\">{label}</div><div class=\"value\">{value}</div></div>\n"
        ));
    }
    html.push_str("</div>\n");

    if let Some(insight) = report.pareto.insight() {
        html.push_str(&format!(
            "<div class=\"insight\">80/20: {}</div>\n",
            escape_html(&insight)
        ));
    }

    html.push_str("<div class=\"charts\">\n");
    if !report.formats.is_empty() {
        chart(html, "views", "Views by format");
        chart(html, "saves", "Saves by format");
        chart(html, "engagement", "Engagement rate by format (%)");
    }
    if !report.pillars.is_empty() {
        chart(html, "secondary", "Pillar performance");
    } else if !report.hook_correlation.is_empty() {
        chart(html, "secondary", "Hook score vs views");
    }
    if !report.slide_counts.is_empty() {
        chart(html, "slides", "Views by slide count");
    }
    html.push_str("</div>\n");

    if !report.formats.is_empty() {
        html.push_str("<h2>Formats</h2>\n");
        table(
            html,
            "formats",
            &["Format", "Posts", "Avg views", "Avg saves", "Engagement"],
        );
    }
    html.push_str("<h2>Top posts</h2>\n");
    table(html, "top", POST_COLUMNS);
    html.push_str("<h2 class=\"bad\">Bottom posts</h2>\n");
    table(html, "bottom", POST_COLUMNS);

    html.push_str("</section>\n");
}

const POST_COLUMNS: &[&str] = &["Platform", "Hook", "Format", "Views", "Saves", "Engagement"];

fn chart(html: &mut String, kind: &str, title: &str) {
    html.push_str(&format!(
        "<div class=\"chart\"><h2>{title}</h2><canvas data-chart=\"{kind}\"></canvas></div>\n"
    ));
}

/// Header only; rows are filled in the browser from the embedded report.
fn table(html: &mut String, kind: &str, columns: &[&str]) {
    html.push_str("<table>\n<thead><tr>");
    for column in columns {
        html.push_str(&format!("<th>{column}</th>"));
    }
    html.push_str(&format!(
        "</tr></thead>\n<tbody data-table=\"{kind}\"></tbody>\n</table>\n"
    ));
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

/// JSON placed inside a `<script>` element must not contain `</`.
fn embed_json(json: &str) -> String {
    json.replace("</", "<\\/")
}
