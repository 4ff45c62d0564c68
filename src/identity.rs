//! Advertised network names and their deep links.

use crate::frame::SSID_MAX_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdentity {
    pub name: String,
    /// Redirect used instead of the global one when the portal AP carries
    /// this name.
    pub url: Option<String>,
}

impl NetworkIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
        }
    }

    /// Parses one `name` or `name|url` line. Returns `None` for blank lines
    /// and names over 32 bytes. The url does not count towards the limit.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (name, url) = match line.find('|') {
            Some(idx) if idx > 0 => {
                let url = line[idx + 1..].trim();
                (
                    line[..idx].trim(),
                    (!url.is_empty()).then(|| url.to_string()),
                )
            }
            _ => (line, None),
        };

        if name.is_empty() || name.len() > SSID_MAX_LEN {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            url,
        })
    }

    pub fn ssid(&self) -> &[u8] {
        self.name.as_bytes()
    }
}

/// Parses newline separated identities, keeping order and duplicates.
pub fn parse_list(text: &str) -> Vec<NetworkIdentity> {
    text.lines().filter_map(NetworkIdentity::parse_line).collect()
}

/// Inverse of [`parse_list`], one identity per line.
pub fn to_text(identities: &[NetworkIdentity]) -> String {
    let mut out = String::new();
    for (i, id) in identities.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&id.name);
        if let Some(url) = &id.url {
            out.push('|');
            out.push_str(url);
        }
    }
    out
}

/// Deep link for an exact name match.
pub fn deep_link<'a>(identities: &'a [NetworkIdentity], name: &str) -> Option<&'a str> {
    identities
        .iter()
        .find(|id| id.name == name)
        .and_then(|id| id.url.as_deref())
}

pub const DEFAULT_IDENTITIES: &str = "Mom Use This One
Abraham Linksys
Benjamin FrankLAN
Martin Router King
John Wilkes Bluetooth
Pretty Fly for a Wi-Fi
Bill Wi the Science Fi
I Believe Wi Can Fi
Tell My Wi-Fi Love Her
No More Mister Wi-Fi
LAN Solo
The LAN Before Time
Silence of the LANs
House LANister
Winternet Is Coming
Ping's Landing
The Ping in the North
This LAN Is My LAN
Get Off My LAN
The Promised LAN
The LAN Down Under
FBI Surveillance Van 4
Area 51 Test Site
Drive-By Wi-Fi
Planet Express
Wu Tang LAN
Darude LANstorm
Never Gonna Give You Up
Hide Yo Kids, Hide Yo Wi-Fi
Loading...
Searching...
VIRUS.EXE
Virus-Infected Wi-Fi
Starbucks Wi-Fi
Text ###-#### for Password
Yell ____ for Password
The Password Is 1234
Free Public Wi-Fi
No Free Wi-Fi Here
Get Your Own Damn Wi-Fi
It Hurts When IP
Dora the Internet Explorer
404 Wi-Fi Unavailable
Porque-Fi
Titanic Syncing
Test Wi-Fi Please Ignore
Drop It Like It's Hotspot
Life in the Fast LAN
The Creep Next Door
Ye Olde Internet";
