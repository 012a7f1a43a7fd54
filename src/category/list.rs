//! Categories listing page with the form for adding a category.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    category::{Category, get_categories_for_team},
    endpoints,
    html::{
        BADGE_STYLE, BUTTON_PRIMARY_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE,
        TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base, format_date_time, text_input,
    },
    navigation::NavBar,
    team::{Team, TeamId, get_team},
    timezone::get_local_offset,
};

/// The state needed for the categories page.
#[derive(Debug, Clone)]
pub struct CategoriesPageState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
}

impl FromRef<AppState> for CategoriesPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Render the categories of a team.
pub async fn get_categories_page(
    State(state): State<CategoriesPageState>,
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
    let categories = get_categories_for_team(team_id, &connection)
        .inspect_err(|error| tracing::error!("Failed to retrieve categories: {error}"))?;

    Ok(categories_view(&team, &categories, local_offset).into_response())
}

fn categories_view(team: &Team, categories: &[Category], local_offset: time::UtcOffset) -> Markup {
    let nav_bar = NavBar::new(endpoints::CATEGORIES_VIEW, team.id).into_html();

    let content = html!(
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4 w-full lg:max-w-5xl"
            {
                h1 class="text-xl font-bold" { (team.name) " Categories" }

                form
                    hx-post=(endpoints::POST_CATEGORY)
                    hx-target-error="#alert-container"
                    class="flex flex-col gap-4 md:flex-row md:items-end"
                {
                    input type="hidden" name="team_id" value=(team.id);

                    (text_input("name", "Category Name", "Groceries", true))

                    div class="md:w-48"
                    {
                        button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Add Category" }
                    }
                }

                table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
                {
                    thead class=(TABLE_HEADER_STYLE)
                    {
                        tr
                        {
                            th scope="col" class=(TABLE_CELL_STYLE) { "Name" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Created" }
                        }
                    }

                    tbody
                    {
                        @for category in categories {
                            tr class=(TABLE_ROW_STYLE)
                            {
                                td class=(TABLE_CELL_STYLE)
                                {
                                    span class=(BADGE_STYLE) { (category.name) }
                                }
                                td class=(TABLE_CELL_STYLE)
                                {
                                    (format_date_time(category.created_at, local_offset))
                                }
                            }
                        }

                        @if categories.is_empty() {
                            tr
                            {
                                td colspan="2" class="px-6 py-4 text-center"
                                {
                                    "No categories yet."
                                }
                            }
                        }
                    }
                }
            }
        }
    );

    base("Categories", &content)
}

#[cfg(test)]
mod categories_page_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::get};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use scraper::{Html, Selector};

    use crate::{
        category::{CategoryName, create_category},
        endpoints, initialize_db,
        team::create_team,
    };

    use super::{CategoriesPageState, get_categories_page};

    fn get_test_server(connection: Connection) -> TestServer {
        let state = CategoriesPageState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Etc/UTC".to_owned(),
        };
        let app = Router::new()
            .route(endpoints::CATEGORIES_VIEW, get(get_categories_page))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn lists_team_categories() {
        let connection = Connection::open_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let team = create_team("Household", &connection).unwrap();
        create_category(CategoryName::new_unchecked("Fuel"), team.id, &connection).unwrap();
        create_category(CategoryName::new_unchecked("Rent"), team.id, &connection).unwrap();
        let server = get_test_server(connection);

        let response = server.get("/1/categories").await;

        response.assert_status_ok();
        let html = Html::parse_document(&response.text());
        let selector = Selector::parse("tbody span").unwrap();
        let names = html
            .select(&selector)
            .map(|element| element.text().collect::<String>())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Fuel", "Rent"]);

        let form_selector = Selector::parse("form[hx-post='/api/categories']").unwrap();
        assert!(html.select(&form_selector).next().is_some());
    }

    #[tokio::test]
    async fn missing_team_is_not_found() {
        let connection = Connection::open_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let server = get_test_server(connection);

        server
            .get("/7/categories")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
