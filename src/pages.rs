/// Every view the page shell can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    /// Nothing selected yet: the welcome screen.
    #[default]
    Landing,
    Login,
    Enroll,
    Home,
    FoodRecommend,
    ImageCapture,
}

const ANONYMOUS_PAGES: &[Page] = &[Page::Login, Page::Enroll];
const MEMBER_PAGES: &[Page] = &[Page::Home, Page::FoodRecommend, Page::ImageCapture];

impl Page {
    pub fn slug(self) -> &'static str {
        match self {
            Page::Landing => "welcome",
            Page::Login => "login",
            Page::Enroll => "enroll",
            Page::Home => "home",
            Page::FoodRecommend => "food",
            Page::ImageCapture => "capture",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "welcome" => Some(Page::Landing),
            "login" => Some(Page::Login),
            "enroll" => Some(Page::Enroll),
            "home" => Some(Page::Home),
            "food" => Some(Page::FoodRecommend),
            "capture" => Some(Page::ImageCapture),
            _ => None,
        }
    }

    /// Sidebar label.
    pub fn title(self) -> &'static str {
        match self {
            Page::Landing => "Welcome",
            Page::Login => "Login",
            Page::Enroll => "New User Enrollment",
            Page::Home => "Home",
            Page::FoodRecommend => "Food Recommendation",
            Page::ImageCapture => "Image Capture",
        }
    }

    /// Pages offered in the sidebar for the given auth state.
    pub fn selectable(authenticated: bool) -> &'static [Page] {
        if authenticated {
            MEMBER_PAGES
        } else {
            ANONYMOUS_PAGES
        }
    }

    pub fn is_selectable(self, authenticated: bool) -> bool {
        Self::selectable(authenticated).contains(&self)
    }

    /// The page actually shown: a selection that does not fit the auth
    /// state falls back to the landing page.
    pub fn effective(self, authenticated: bool) -> Page {
        if self.is_selectable(authenticated) {
            self
        } else {
            Page::Landing
        }
    }
}
