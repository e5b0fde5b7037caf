//! The table of HTTP methods routes can be registered for.
//!
//! [`HttpMethod`] is closed: registering a route for a name outside the table
//! fails with [`JunctionError::UnsupportedMethod`]. Requests may still carry
//! other methods; those only reach `all` routes and middleware.

use std::fmt;
use std::str::FromStr;

use junction_core::JunctionError;

macro_rules! http_methods {
    ($($variant:ident => $name:literal,)+) => {
        /// An HTTP method that routes can be registered for.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum HttpMethod {
            $(
                #[doc = concat!("The `", $name, "` method.")]
                $variant,
            )+
        }

        impl HttpMethod {
            /// Every supported method, in alphabetical order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Returns the upper-case wire name of this method.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl FromStr for HttpMethod {
            type Err = JunctionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_uppercase().as_str() {
                    $($name => Ok(Self::$variant),)+
                    _ => Err(JunctionError::UnsupportedMethod(s.to_string())),
                }
            }
        }
    };
}

http_methods! {
    Acl => "ACL",
    Bind => "BIND",
    Checkout => "CHECKOUT",
    Connect => "CONNECT",
    Copy => "COPY",
    Delete => "DELETE",
    Get => "GET",
    Head => "HEAD",
    Link => "LINK",
    Lock => "LOCK",
    MSearch => "M-SEARCH",
    Merge => "MERGE",
    MkActivity => "MKACTIVITY",
    MkCalendar => "MKCALENDAR",
    MkCol => "MKCOL",
    Move => "MOVE",
    Notify => "NOTIFY",
    Options => "OPTIONS",
    Patch => "PATCH",
    Post => "POST",
    PropFind => "PROPFIND",
    PropPatch => "PROPPATCH",
    Purge => "PURGE",
    Put => "PUT",
    Rebind => "REBIND",
    Report => "REPORT",
    Search => "SEARCH",
    Source => "SOURCE",
    Subscribe => "SUBSCRIBE",
    Trace => "TRACE",
    Unbind => "UNBIND",
    Unlink => "UNLINK",
    Unlock => "UNLOCK",
    Unsubscribe => "UNSUBSCRIBE",
}

/// Invokes `$callback!` with one `fn_name => Variant, "NAME"` entry per
/// method in the table.
///
/// Router, Route and App use it to generate their per-method registration
/// functions.
#[doc(hidden)]
#[macro_export]
macro_rules! for_each_method {
    ($callback:ident) => {
        $callback! {
            acl => Acl, "ACL";
            bind => Bind, "BIND";
            checkout => Checkout, "CHECKOUT";
            connect => Connect, "CONNECT";
            copy => Copy, "COPY";
            delete => Delete, "DELETE";
            get => Get, "GET";
            head => Head, "HEAD";
            link => Link, "LINK";
            lock => Lock, "LOCK";
            m_search => MSearch, "M-SEARCH";
            merge => Merge, "MERGE";
            mkactivity => MkActivity, "MKACTIVITY";
            mkcalendar => MkCalendar, "MKCALENDAR";
            mkcol => MkCol, "MKCOL";
            r#move => Move, "MOVE";
            notify => Notify, "NOTIFY";
            options => Options, "OPTIONS";
            patch => Patch, "PATCH";
            post => Post, "POST";
            propfind => PropFind, "PROPFIND";
            proppatch => PropPatch, "PROPPATCH";
            purge => Purge, "PURGE";
            put => Put, "PUT";
            rebind => Rebind, "REBIND";
            report => Report, "REPORT";
            search => Search, "SEARCH";
            source => Source, "SOURCE";
            subscribe => Subscribe, "SUBSCRIBE";
            trace => Trace, "TRACE";
            unbind => Unbind, "UNBIND";
            unlink => Unlink, "UNLINK";
            unlock => Unlock, "UNLOCK";
            unsubscribe => Unsubscribe, "UNSUBSCRIBE";
        }
    };
}

impl HttpMethod {
    /// Maps a request method onto the table, if it is part of it.
    pub fn from_http(method: &http::Method) -> Option<Self> {
        method.as_str().parse().ok()
    }

    /// Converts back into an [`http::Method`].
    pub fn to_http(self) -> http::Method {
        http::Method::from_bytes(self.as_str().as_bytes()).unwrap_or(http::Method::GET)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for HttpMethod {
    type Error = JunctionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}
