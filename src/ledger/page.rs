//! The ledger page lists a team's entries with inline controls for correcting them.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::UtcOffset;

use crate::{
    AppState, Error,
    category::{Category, get_categories_for_team},
    endpoints,
    html::{
        BADGE_STYLE, BUTTON_SMALL_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE,
        TABLE_HEADER_STYLE, TABLE_INPUT_STYLE, TABLE_ROW_STYLE, base, format_currency,
        format_date_time,
    },
    ledger::{LedgerRow, LedgerStatus, get_team_ledger},
    navigation::NavBar,
    source::TransactionType,
    team::{Team, TeamId, get_team},
    timezone::get_local_offset,
};

/// The state needed for the ledger page.
#[derive(Debug, Clone)]
pub struct LedgerPageState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
}

impl FromRef<AppState> for LedgerPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Render the ledger of a team.
pub async fn get_ledger_page(
    State(state): State<LedgerPageState>,
    Path(team_id): Path<TeamId>,
) -> Result<Response, Error> {
    let local_offset = get_local_offset(&state.local_timezone)
        .ok_or_else(|| Error::InvalidTimezoneError(state.local_timezone.clone()))?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let team = get_team(team_id, &connection)?;
    let rows = get_team_ledger(team_id, &connection)
        .inspect_err(|error| tracing::error!("Failed to retrieve the ledger: {error}"))?;
    let categories = get_categories_for_team(team_id, &connection)?;

    Ok(ledger_view(&team, &rows, &categories, local_offset).into_response())
}

fn ledger_view(
    team: &Team,
    rows: &[LedgerRow],
    categories: &[Category],
    local_offset: UtcOffset,
) -> Markup {
    let nav_bar = NavBar::new(endpoints::LEDGER_VIEW, team.id).into_html();

    let content = html!(
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4 w-full"
            {
                h1 class="text-xl font-bold" { (team.name) " Ledger" }

                div class="overflow-x-auto"
                {
                    table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Subject" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Source" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "User" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Type" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Category" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Amount" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Payee" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Status" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "" }
                            }
                        }

                        tbody
                        {
                            @for row in rows {
                                (ledger_row_view(row, categories, local_offset))
                            }

                            @if rows.is_empty() {
                                tr
                                {
                                    td colspan="10" class="px-6 py-4 text-center"
                                    {
                                        "Nothing here yet. Entries appear once a source has fetched its emails."
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    );

    base("Ledger", &content)
}

fn ledger_row_view(row: &LedgerRow, categories: &[Category], local_offset: UtcOffset) -> Markup {
    let entry = &row.entry;
    let form_id = format!("ledger-form-{}", entry.id);
    let edit_url = endpoints::format_endpoint(endpoints::EDIT_LEDGER_ENTRY, entry.id);
    // The amount input expects a plain number.
    let amount_value = entry.amount_extract.map(|amount| amount.to_string());

    html!(
        tr class=(TABLE_ROW_STYLE) data-ledger-id=(entry.id)
        {
            td class=(TABLE_CELL_STYLE) { (format_date_time(entry.date, local_offset)) }
            td class=(TABLE_CELL_STYLE)
            {
                @match &entry.email_id {
                    Some(email_id) => {
                        a
                            href=(endpoints::format_endpoint(endpoints::GMAIL_MESSAGE_LINK, email_id))
                            target="_blank"
                            rel="noopener noreferrer"
                            class=(LINK_STYLE)
                        {
                            (entry.email_subject)
                        }
                    }
                    None => { (entry.email_subject) }
                }
            }
            td class=(TABLE_CELL_STYLE) { (row.source_name) }
            td class=(TABLE_CELL_STYLE) { (row.user_email) }
            td class=(TABLE_CELL_STYLE)
            {
                select name="transaction_type" form=(form_id) class=(TABLE_INPUT_STYLE)
                {
                    @for transaction_type in TransactionType::ALL {
                        option
                            value=(transaction_type)
                            selected[transaction_type == entry.transaction_type_extract]
                        {
                            (transaction_type)
                        }
                    }
                }
            }
            td class=(TABLE_CELL_STYLE)
            {
                select name="category_id" form=(form_id) class=(TABLE_INPUT_STYLE)
                {
                    option value="" selected[entry.category_id.is_none()]
                    {
                        (entry.category_extract)
                    }

                    @for category in categories {
                        option
                            value=(category.id)
                            selected[entry.category_id == Some(category.id)]
                        {
                            (category.name)
                        }
                    }
                }
            }
            td class=(TABLE_CELL_STYLE)
            {
                input
                    type="number"
                    step="0.01"
                    name="amount"
                    form=(form_id)
                    value=[amount_value]
                    title=[entry.amount_extract.map(format_currency)]
                    class=(TABLE_INPUT_STYLE);
            }
            td class=(TABLE_CELL_STYLE)
            {
                input
                    type="text"
                    name="payee"
                    form=(form_id)
                    value=[entry.payee_extract.as_deref()]
                    class=(TABLE_INPUT_STYLE);
            }
            td class=(TABLE_CELL_STYLE)
            {
                @if entry.status == LedgerStatus::Manual {
                    span class=(BADGE_STYLE) { (entry.status) }
                } @else {
                    (entry.status)
                }
            }
            td class=(TABLE_CELL_STYLE)
            {
                form
                    id=(form_id)
                    hx-post=(edit_url)
                    hx-swap="none"
                    hx-target-error="#alert-container"
                {
                    button type="submit" class=(BUTTON_SMALL_STYLE) { "Save" }
                }
            }
        }
    )
}

#[cfg(test)]
mod ledger_page_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::get};
    use axum_test::TestServer;
    use scraper::{Html, Selector};
    use time::macros::datetime;

    use crate::{
        endpoints,
        ledger::{
            test_utils::{get_db_with_source, new_entry},
            upsert_ledger_entry,
        },
    };

    use super::{LedgerPageState, get_ledger_page};

    fn get_test_server(state: LedgerPageState) -> TestServer {
        let app = Router::new()
            .route(endpoints::LEDGER_VIEW, get(get_ledger_page))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn lists_entries_newest_first_with_edit_forms() {
        let (connection, _, source) = get_db_with_source();
        for (email_id, date) in [
            ("older", datetime!(2025-01-14 08:00 UTC)),
            ("newer", datetime!(2025-01-15 08:00 UTC)),
        ] {
            upsert_ledger_entry(&new_entry(email_id, date, &source), &connection).unwrap();
        }
        let server = get_test_server(LedgerPageState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Etc/UTC".to_owned(),
        });

        let response = server.get("/1/ledger").await;

        response.assert_status_ok();
        let html = Html::parse_document(&response.text());
        let links = Selector::parse("tbody td a").unwrap();
        let hrefs = html
            .select(&links)
            .filter_map(|link| link.value().attr("href"))
            .collect::<Vec<_>>();
        assert_eq!(
            hrefs,
            vec![
                "https://mail.google.com/mail/#inbox/newer",
                "https://mail.google.com/mail/#inbox/older",
            ]
        );

        let forms = Selector::parse("form[hx-post]").unwrap();
        let form_targets = html
            .select(&forms)
            .filter_map(|form| form.value().attr("hx-post"))
            .collect::<Vec<_>>();
        assert_eq!(form_targets, vec!["/api/ledger/2", "/api/ledger/1"]);

        let amount = Selector::parse("input[name=amount][form=ledger-form-1]").unwrap();
        let amount_input = html.select(&amount).next().expect("amount input missing");
        assert_eq!(amount_input.value().attr("value"), Some("250"));
    }

    #[tokio::test]
    async fn invalid_timezone_is_server_error() {
        let (connection, _, _) = get_db_with_source();
        let server = get_test_server(LedgerPageState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Not/AZone".to_owned(),
        });

        server
            .get("/1/ledger")
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }
}
