//! The sources page: the team's sources and a form for adding one.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error, endpoints,
    html::{
        BADGE_STYLE, BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base,
        select_input, text_input,
    },
    navigation::NavBar,
    source::{CategoryPreset, Source, SourceType, TransactionType, get_sources_for_team},
    team::{Team, TeamId, get_team},
    user::{User, get_team_users},
};

/// The state needed for the sources page.
#[derive(Debug, Clone)]
pub struct SourcesPageState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SourcesPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Render the sources of a team's users.
pub async fn get_sources_page(
    State(state): State<SourcesPageState>,
    Path(team_id): Path<TeamId>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let team = get_team(team_id, &connection)?;
    let sources = get_sources_for_team(team_id, &connection)
        .inspect_err(|error| tracing::error!("Failed to retrieve sources: {error}"))?;
    let users = get_team_users(team_id, &connection)?;

    Ok(sources_view(&team, &sources, &users).into_response())
}

fn sources_view(team: &Team, sources: &[(Source, String)], users: &[User]) -> Markup {
    let nav_bar = NavBar::new(endpoints::SOURCES_VIEW, team.id).into_html();

    let content = html!(
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4 w-full lg:max-w-6xl"
            {
                h1 class="text-xl font-bold" { (team.name) " Sources" }

                div class="overflow-x-auto"
                {
                    table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "Name" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Owner" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Type" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Defaults" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Search Filter" }
                            }
                        }

                        tbody
                        {
                            @for (source, owner_email) in sources {
                                (source_row(source, owner_email))
                            }

                            @if sources.is_empty() {
                                tr
                                {
                                    td colspan="5" class="px-6 py-4 text-center"
                                    {
                                        "No sources yet."
                                    }
                                }
                            }
                        }
                    }
                }

                h2 class="text-lg font-semibold" { "New Source" }

                @if users.is_empty() {
                    p { "Create a user for this team before adding sources." }
                } @else {
                    (new_source_form(users))
                }
            }
        }
    );

    base("Sources", &content)
}

fn source_row(source: &Source, owner_email: &str) -> Markup {
    html!(
        tr class=(TABLE_ROW_STYLE)
        {
            td class=(TABLE_CELL_STYLE) { (source.name) }
            td class=(TABLE_CELL_STYLE) { (owner_email) }
            td class=(TABLE_CELL_STYLE) { (source.source_type) }
            td class=(TABLE_CELL_STYLE)
            {
                span class=(BADGE_STYLE) { (source.default_type) }
                " "
                span class=(BADGE_STYLE) { (source.default_category) }
            }
            td class=(TABLE_CELL_STYLE)
            {
                code { (source.search_filter()) }
            }
        }
    )
}

fn new_source_form(users: &[User]) -> Markup {
    let source_types = SourceType::ALL.map(|source_type| source_type.as_str());
    let transaction_types = TransactionType::ALL.map(|transaction_type| transaction_type.as_str());
    let presets = CategoryPreset::ALL.map(|preset| preset.as_str());

    html!(
        form
            hx-post=(endpoints::POST_SOURCE)
            hx-target-error="#alert-container"
            class="grid grid-cols-1 gap-4 md:grid-cols-2"
        {
            (text_input("name", "Source Name", "Card alerts", true))

            div
            {
                label for="userId" class=(FORM_LABEL_STYLE) { "Owner" }

                select id="userId" name="userId" class=(FORM_TEXT_INPUT_STYLE)
                {
                    @for user in users {
                        option value=(user.id) { (user.email) }
                    }
                }
            }

            (select_input("sourceType", "Source Type", &source_types))
            (select_input("defaultType", "Income or Expense", &transaction_types))
            (select_input("defaultCategory", "Default Category", &presets))
            (text_input("query", "Raw Search Query", "from:alerts@bank.com newer_than:7d", false))
            (text_input("fromEmail", "From Email", "alerts@bank.com", false))
            (text_input("subject", "Subject", "Transaction alert", false))
            (text_input("label", "Label", "banking", false))
            (text_input("amountRegex", "Amount Regex", r"Rs\.? ?([0-9,]+\.?[0-9]*)", false))
            (text_input("amountRegexBackup", "Amount Regex Backup", "", false))
            (text_input("payeeRegex", "Payee Regex", "at (?P<payee>.+?) on", false))
            (text_input("payeeRegexBackup", "Payee Regex Backup", "", false))

            div class="md:col-span-2"
            {
                button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Create Source" }
            }
        }
    )
}

#[cfg(test)]
mod sources_page_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::get};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use scraper::{Html, Selector};

    use crate::{
        endpoints, initialize_db,
        source::{SourceFields, create_source},
        team::create_team,
        user::create_user,
    };

    use super::{SourcesPageState, get_sources_page};

    fn get_test_server(connection: Connection) -> TestServer {
        let state = SourcesPageState {
            db_connection: Arc::new(Mutex::new(connection)),
        };
        let app = Router::new()
            .route(endpoints::SOURCES_VIEW, get(get_sources_page))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn renders_sources_and_form() {
        let connection = Connection::open_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let team = create_team("Household", &connection).unwrap();
        let user = create_user("a@example.com", None, team.id, &connection).unwrap();
        let fields = SourceFields {
            name: "Card alerts".to_owned(),
            from_email: Some("alerts@bank.com".to_owned()),
            user_id: user.id,
            ..Default::default()
        };
        create_source(fields.validate().unwrap(), &connection).unwrap();
        let server = get_test_server(connection);

        let response = server.get("/1/sources").await;

        response.assert_status_ok();
        let html = Html::parse_document(&response.text());
        let code = Selector::parse("tbody code").unwrap();
        let filters = html
            .select(&code)
            .map(|element| element.text().collect::<String>())
            .collect::<Vec<_>>();
        assert_eq!(filters, vec!["from:alerts@bank.com"]);

        let owner_options = Selector::parse("form select[name=userId] option").unwrap();
        assert_eq!(html.select(&owner_options).count(), 1);
        let preset_options = Selector::parse("select[name=defaultCategory] option").unwrap();
        assert_eq!(html.select(&preset_options).count(), 20);
    }

    #[tokio::test]
    async fn missing_team_is_not_found() {
        let connection = Connection::open_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let server = get_test_server(connection);

        server
            .get("/3/sources")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
