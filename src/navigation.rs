//! This file defines the templates and a convenience function for creating the navigation bar.

use maud::{Markup, html};

use crate::{endpoints, team::TeamId};

/// Template for a link in the navigation bar.
///
/// It will change appearance if `is_current` is set to
/// `true`. Only one link should be set as active at any one time.
struct Link {
    url: String,
    title: &'static str,
    is_current: bool,
}

impl Link {
    fn new(endpoint: &str, title: &'static str, team_id: TeamId, active_endpoint: &str) -> Self {
        Self {
            url: endpoints::format_endpoint(endpoint, team_id),
            title,
            is_current: endpoint == active_endpoint,
        }
    }

    fn into_html(self) -> Markup {
        let style = if self.is_current {
            "block py-2 px-3 text-white bg-blue-700 rounded-sm lg:bg-transparent
        lg:text-blue-700 lg:p-0 dark:text-white lg:dark:text-blue-500"
        } else {
            "block py-2 px-3 text-gray-900 rounded-sm hover:bg-gray-100
        lg:hover:bg-transparent lg:border-0 lg:hover:text-blue-700 lg:p-0
        dark:text-white lg:dark:hover:text-blue-500 dark:hover:bg-gray-700
        dark:hover:text-white lg:dark:hover:bg-transparent"
        };

        html!(
            a
                href=(self.url)
                class=(style)
                aria-current=[self.is_current.then_some("page")]
            {
                (self.title)
            }
        )
    }
}

pub struct NavBar {
    links: Vec<Link>,
}

impl NavBar {
    /// Get the navigation bar for the pages of `team_id`.
    ///
    /// If a link matches `active_endpoint` (the unformatted route, e.g.
    /// [endpoints::LEDGER_VIEW]), then that link will be marked as active and
    /// displayed differently in the HTML.
    pub fn new(active_endpoint: &str, team_id: TeamId) -> NavBar {
        let links = vec![
            Link::new(endpoints::LEDGER_VIEW, "Ledger", team_id, active_endpoint),
            Link::new(endpoints::SOURCES_VIEW, "Sources", team_id, active_endpoint),
            Link::new(
                endpoints::CATEGORIES_VIEW,
                "Categories",
                team_id,
                active_endpoint,
            ),
        ];

        NavBar { links }
    }

    pub fn into_html(self) -> Markup {
        // Template adapted from https://flowbite.com/docs/components/navbar/#default-navbar
        html!(
            nav class="bg-white border-gray-200 dark:bg-gray-900"
            {
                div
                    class="max-w-screen-xl flex flex-wrap items-center justify-between mx-auto p-4"
                {
                    a
                        href="/"
                        class="self-center text-2xl font-semibold whitespace-nowrap dark:text-white"
                    {
                        "Mailledger"
                    }

                    ul
                        class="font-medium flex flex-row space-x-8 rtl:space-x-reverse"
                    {
                        @for link in self.links {
                            li { (link.into_html()) }
                        }
                    }
                }
            }
        )
    }
}
