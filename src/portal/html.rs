//! Embedded HTML assets

/// Escapes text for HTML element content and quoted attributes.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Escapes text for a single quoted JS string inside an HTML attribute.
pub fn escape_js(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("\\x3c"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

const PORTAL_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width,initial-scale=1">
    <title>Portal</title>
    <style>
        :root { --bg:#000; --card:#161b22; --border:#30363d; --dim:#8b949e; }
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            background: var(--bg);
            height: 100vh;
            width: 100vw;
            overflow: hidden;
            display: flex;
            flex-direction: column;
        }
        iframe { border: none; width: 100%; flex: 1; background: #fff; }
        .foot-bar {
            background: var(--card);
            border-top: 1px solid var(--border);
            padding: 15px;
            display: flex;
            justify-content: center;
        }
        .btn {
            display: block;
            width: 100%;
            max-width: 400px;
            padding: 14px 20px;
            background: linear-gradient(135deg, #238636, #2ea043);
            color: #fff;
            border-radius: 10px;
            font-weight: 600;
            text-align: center;
            text-decoration: none;
        }
    </style>
</head>
<body>
    <iframe src="/content" title="Portal Content"></iframe>
"#;

const PORTAL_SCRIPT: &str = r#"
    <script>
        function go(url) {
            if (navigator.clipboard) { navigator.clipboard.writeText(url).catch(function () {}); }
            var b = document.getElementById('btn');
            if (b) { b.innerText = 'Opening...'; }
            setTimeout(function () { window.location.href = url; }, 500);
        }
    </script>
"#;

/// Portal shell: the content iframe plus the call to action bar.
pub fn portal_page(button: Option<(&str, &str)>, auto_redirect_secs: u32) -> String {
    let mut page = String::from(PORTAL_HEAD);

    if let Some((text, url)) = button {
        page.push_str(&format!(
            concat!(
                "    <div class=\"foot-bar\">",
                "<a href=\"#\" class=\"btn\" id=\"btn\" onclick=\"go('{}');return false;\">",
                "{}</a></div>\n",
            ),
            escape_js(url),
            escape(text)
        ));
    }

    page.push_str(PORTAL_SCRIPT);

    if let (Some((_, url)), true) = (button, auto_redirect_secs > 0) {
        page.push_str(&format!(
            "    <script>setTimeout(function () {{ go('{}'); }}, {});</script>\n",
            escape_js(url),
            auto_redirect_secs as u64 * 1000
        ));
    }

    page.push_str("</body>\n</html>");
    page
}

/// Default iframe content.
pub fn default_content(headline: &str, description: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width,initial-scale=1">
    <style>
        body {{ font-family: -apple-system, sans-serif; background: #0d1117; color: #c9d1d9;
               display: flex; align-items: center; justify-content: center; min-height: 100vh;
               text-align: center; padding: 24px; }}
        h1 {{ color: #58a6ff; margin-bottom: 16px; }}
        .desc {{ color: #8b949e; line-height: 1.5; }}
    </style>
</head>
<body>
    <div>
        <h1>{}</h1>
        <p class="desc">{}</p>
    </div>
</body>
</html>"#,
        escape(headline),
        escape(description)
    )
}

pub fn redirect_page(url: &str) -> String {
    let attr = escape(url);
    format!(
        concat!(
            r#"<!DOCTYPE html><html><head><meta http-equiv="refresh" content="0; url={attr}" />"#,
            r#"<script>window.location.href='{js}';</script></head>"#,
            r#"<body>Redirecting to <a href="{attr}">{attr}</a></body></html>"#,
        ),
        attr = attr,
        js = escape_js(url)
    )
}

pub const ADMIN_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Beacon Admin</title>
    <style>
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            background: #1a1a2e;
            color: #eee;
            min-height: 100vh;
            padding: 20px;
        }
        .container { max-width: 560px; margin: 0 auto; }
        h1 { text-align: center; margin-bottom: 24px; font-size: 24px; color: #00d4ff; }
        h2 { font-size: 16px; color: #00d4ff; margin: 20px 0 10px; }
        label { display: block; margin: 10px 0 6px; font-size: 14px; color: #aaa; }
        input, textarea {
            width: 100%;
            padding: 10px;
            border: 1px solid #333;
            border-radius: 8px;
            background: #16213e;
            color: #fff;
            font-size: 15px;
        }
        input[type=checkbox] { width: auto; margin-right: 8px; }
        textarea { min-height: 220px; font-family: monospace; }
        button {
            margin-top: 14px;
            padding: 12px;
            width: 100%;
            border: none;
            border-radius: 8px;
            background: #00d4ff;
            color: #1a1a2e;
            font-weight: bold;
            cursor: pointer;
        }
        #status { background: #16213e; padding: 12px; border-radius: 8px; font-size: 14px; }
        #status span { color: #00d4ff; }
        #message { margin-top: 16px; text-align: center; }
        .list { background: #16213e; padding: 12px; border-radius: 8px; font-size: 14px; }
        .list div { display: flex; justify-content: space-between; padding: 4px 0; }
        a.button {
            display: block;
            margin-top: 14px;
            padding: 12px;
            border-radius: 8px;
            background: #00d4ff;
            color: #1a1a2e;
            font-weight: bold;
            text-align: center;
            text-decoration: none;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>Beacon Admin</h1>
        <div id="status">
            Uptime: <span id="uptime">-</span>s &middot;
            Heap: <span id="freeHeap">-</span> &middot;
            Clients: <span id="clientCount">-</span> &middot;
            Packets/s: <span id="packetsPerSecond">-</span>
        </div>

        <h2>Networks (one per line, optional "name|url")</h2>
        <textarea id="ssids"></textarea>
        <button onclick="saveSsids()">Save networks</button>

        <h2>Beacons</h2>
        <label><input type="checkbox" id="wpa2">Advertise WPA2</label>
        <label><input type="checkbox" id="appendSpaces">Pad names to 32 characters</label>
        <label><input type="checkbox" id="randomizeMac">Random MAC</label>
        <label>Interval (ms)</label><input type="number" id="beaconInterval">
        <label>Channels (comma separated)</label><input type="text" id="channels">

        <h2>Portal</h2>
        <label>Headline</label><input type="text" id="advertisingHeadline">
        <label>Description</label><input type="text" id="advertisingDescription">
        <label>Button text</label><input type="text" id="buttonText">
        <label><input type="checkbox" id="disableButton">Hide button</label>
        <label>Redirect URL</label><input type="text" id="redirectUrl">
        <label>Auto redirect (s)</label><input type="number" id="autoRedirectDelay">
        <label><input type="checkbox" id="useCustomPortal">Use custom page</label>

        <h2>Access point</h2>
        <label>AP name</label><input type="text" id="apName">
        <label><input type="checkbox" id="hideAp">Hidden</label>
        <label>AP channel</label><input type="number" id="wifiChannel">

        <h2>Admin</h2>
        <label>User</label><input type="text" id="adminUser">
        <label>Password</label><input type="password" id="adminPass">

        <button onclick="saveConfig()">Save settings</button>

        <h2>Connected clients</h2>
        <div class="list" id="clients">-</div>
        <button onclick="loadClients()">Refresh clients</button>

        <h2>Custom portal page</h2>
        <textarea id="portalHtml"></textarea>
        <button onclick="savePortalHtml()">Save page</button>
        <button onclick="resetPortalHtml()">Reset to default</button>

        <h2>Backup</h2>
        <a class="button" href="/api/export" download="beacon_config.json">Export settings</a>
        <label>Import settings</label>
        <input type="file" id="importFile" accept=".json,application/json">
        <button onclick="importConfig()">Import</button>

        <button onclick="reboot()">Reboot</button>
        <div id="message"></div>
    </div>

    <script>
        const bools = ['wpa2', 'appendSpaces', 'randomizeMac', 'disableButton',
            'useCustomPortal', 'hideAp'];
        const texts = ['advertisingHeadline', 'advertisingDescription', 'buttonText',
            'redirectUrl', 'apName', 'adminUser', 'adminPass'];
        const nums = ['beaconInterval', 'autoRedirectDelay', 'wifiChannel'];
        const $ = (id) => document.getElementById(id);
        const say = (t) => { $('message').textContent = t; };

        async function load() {
            const d = await (await fetch('/api/data')).json();
            ['uptime', 'freeHeap', 'clientCount', 'packetsPerSecond']
                .forEach(k => $(k).textContent = d[k]);
            bools.forEach(k => $(k).checked = !!d[k]);
            texts.forEach(k => $(k).value = d[k] || '');
            nums.forEach(k => $(k).value = d[k]);
            $('channels').value = (d.channels || []).join(',');
            $('ssids').value = d.ssids || '';
        }

        async function post(url, body, type) {
            const r = await fetch(url, { method: 'POST', headers: { 'Content-Type': type }, body });
            say(await r.text());
        }

        function saveSsids() { post('/api/save_ssids', $('ssids').value, 'text/plain'); }

        function saveConfig() {
            const c = {};
            bools.forEach(k => c[k] = $(k).checked);
            texts.forEach(k => c[k] = $(k).value);
            nums.forEach(k => c[k] = parseInt($(k).value, 10) || 0);
            c.channels = $('channels').value.split(',')
                .map(s => parseInt(s, 10))
                .filter(n => !isNaN(n));
            post('/api/save_config', JSON.stringify(c), 'application/json');
        }

        async function loadClients() {
            const d = await (await fetch('/api/clients')).json();
            const list = $('clients');
            list.textContent = d.total ? '' : 'No clients';
            d.clients.forEach(c => {
                const row = document.createElement('div');
                const mac = document.createElement('span');
                const rssi = document.createElement('span');
                mac.textContent = c.mac;
                rssi.textContent = c.rssi + ' dBm';
                row.append(mac, rssi);
                list.append(row);
            });
        }

        async function loadPortalHtml() {
            $('portalHtml').value = await (await fetch('/api/portal_html')).text();
        }

        async function savePortalHtml() {
            await post('/api/save_portal_html', $('portalHtml').value, 'text/plain');
        }

        async function resetPortalHtml() {
            await post('/api/reset_portal_html', '', 'text/plain');
            await loadPortalHtml();
        }

        async function importConfig() {
            const f = $('importFile').files[0];
            if (!f) { say('Choose a file first'); return; }
            await post('/api/import', await f.text(), 'application/json');
            await load();
        }

        function reboot() { post('/api/reboot', '', 'text/plain'); }

        load().catch(e => say('Failed to load: ' + e));
        loadClients().catch(e => say('Failed to load clients: ' + e));
        loadPortalHtml().catch(e => say('Failed to load page: ' + e));
    </script>
</body>
</html>"#;
