// ============================================================================
// Frontend (HTML dashboard)
// ============================================================================
//
// The page only swaps server-rendered fragments into its containers; all
// normalisation and escaping happens in `render`.

pub const DASHBOARD_HTML: &str = r####"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Chenda</title>
<style>
body { margin:0; background:#1e1e1e; color:#ddd; font-family:Arial; }
header { background:#111; padding:12px; display:flex; flex-direction:column; gap:8px; }
.header-top { display:flex; align-items:center; gap:12px; }
header h1 { margin:0; }
#search { flex:1; padding:6px; background:#222; border:1px solid #444; color:#fff; }
#tabs { display:flex; gap:6px; align-items:center; }
.tab-btn {
  padding:6px 10px;
  border:none;
  background:#222;
  color:#ccc;
  cursor:pointer;
  font-size:12px;
}
.tab-btn.active { background:#444; color:#fff; }
#refresh { margin-left:auto; }
.meta { color:#888; font-size:12px; padding:6px 0; }
#notice { color:#ff9800; font-size:12px; min-height:14px; }
.cols { display:flex; gap:12px; }
.col { flex:1; }
.col h3 { font-size:13px; margin:10px 0 6px 0; color:#aaa; }
.chips { display:flex; flex-wrap:wrap; gap:6px; }
.chip { display:flex; align-items:center; gap:6px; background:#252525; padding:4px 8px; border-radius:14px; font-size:12px; }
.chip small { color:#888; }
.icon { width:18px; height:18px; border-radius:50%; }
.tag { background:#333; color:#aaa; font-size:10px; padding:1px 4px; border-radius:3px; }
.price { color:#4caf50; }
.rec { background:#252525; padding:8px; margin:6px 0; border-radius:6px; font-size:12px; }
.rec .head { display:flex; align-items:center; gap:6px; }
.rec .conf { margin-left:auto; color:#aaa; }
.rec .reason { color:#bbb; margin:4px 0; }
.rec .details { color:#888; }
.rec .time { color:#666; }
.sig-buy { color:#00e676; font-weight:bold; }
.sig-sell { color:#ff1744; font-weight:bold; }
.sig-hold { color:#ffc107; font-weight:bold; }
table { width:100%; border-collapse:collapse; margin-top:10px; font-size:12px; }
th { background:#222; padding:6px; border-bottom:1px solid #333; text-align:left; }
td { padding:6px; border-bottom:1px solid #333; }
tr:nth-child(even){ background:#252525; }
.whale td:first-child { color:#ffeb3b; font-weight:bold; }
#chatLog { height:140px; overflow-y:auto; background:#181818; padding:6px; font-size:12px; }
.msg.me { color:#90caf9; }
.msg.her { color:#ddd; }
#chatInput { width:70%; padding:6px; background:#222; border:1px solid #444; color:#fff; }
</style>
</head>
<body>
<header>
  <div class="header-top">
    <h1>Chenda</h1>
    <input id="search" placeholder="Filter coins (xrp, sol, btc)..." />
    <label><input type="checkbox" id="usd" /> USD prices</label>
  </div>
  <div id="tabs">
    <button class="tab-btn" data-tab="new">New</button>
    <button class="tab-btn" data-tab="top">Top Gainers</button>
    <button class="tab-btn active" data-tab="future">Future Gainers</button>
    <button class="tab-btn" data-tab="recs">Recommendations</button>
    <button class="tab-btn" id="refresh">Refresh</button>
  </div>
  <div class="meta">Last updated: <span id="lastUpdated">—</span></div>
  <div id="notice"></div>
</header>
<main style="padding:0 8px 8px 8px;">
  <div id="view-lists" class="cols">
    <div class="col"><h3>Kraken (<span id="krakenCount">0</span>)</h3><div id="kraken" class="chips"></div></div>
    <div class="col"><h3>Binance (<span id="binanceCount">0</span>)</h3><div id="binance" class="chips"></div></div>
  </div>
  <div id="view-recs" style="display:none;"></div>

  <h3>Live signals (<span id="signalsCount">0</span>)</h3>
  <div id="signals"></div>

  <h3>Whale trades</h3>
  <div id="whales"></div>

  <h3>Upstream</h3>
  <div id="tabs-raw" style="display:flex; gap:6px;">
    <button class="tab-btn" data-raw="universe">Universe</button>
    <button class="tab-btn" data-raw="last">Last</button>
    <button class="tab-btn" data-raw="health">Health</button>
    <button class="tab-btn" data-raw="books">Books XRP</button>
  </div>
  <div id="raw"></div>

  <h3>Chat</h3>
  <div id="chatLog"></div>
  <input id="chatInput" placeholder="say REFRESH or SHOW XRP" />
  <button class="tab-btn" id="sendBtn">Send</button>
</main>
<script>
const el = (id) => document.getElementById(id);

function applyView(v) {
  document.querySelectorAll('#tabs .tab-btn[data-tab]').forEach(b => {
    b.classList.toggle('active', b.dataset.tab === v.tab);
  });
  const recsTab = v.tab === 'recs';
  el('view-lists').style.display = recsTab ? 'none' : 'flex';
  el('view-recs').style.display = recsTab ? 'block' : 'none';
  el('kraken').innerHTML = v.kraken.html;
  el('binance').innerHTML = v.binance.html;
  el('krakenCount').textContent = v.kraken.count;
  el('binanceCount').textContent = v.binance.count;
  el('view-recs').innerHTML = v.recs.html;
  el('whales').innerHTML = v.whales.html;
  el('lastUpdated').textContent = v.last_updated || '—';
  el('notice').textContent = v.notice || '';
  if (document.activeElement !== el('search')) el('search').value = v.filter;
  if (el('usd').checked) refreshPrices();
}

async function call(url, body) {
  const opts = body === undefined
    ? { method: 'POST' }
    : { method: 'POST', headers: { 'Content-Type': 'application/json' }, body: JSON.stringify(body) };
  const r = await fetch(url, opts);
  if (!r.ok) throw new Error('HTTP ' + r.status);
  return r.json();
}

async function loadView() {
  try {
    const r = await fetch('/api/view', { cache: 'no-store' });
    applyView(await r.json());
  } catch (e) { console.error(e); }
}

async function refreshPrices() {
  const slots = Array.from(document.querySelectorAll('.price[data-base]'));
  const bases = [...new Set(slots.map(s => s.dataset.base))];
  for (const base of bases) {
    try {
      const r = await fetch('/api/price/' + encodeURIComponent(base));
      const j = await r.json();
      slots.filter(s => s.dataset.base === base)
           .forEach(s => s.textContent = j.usd == null ? '' : '$' + Number(j.usd).toPrecision(6));
    } catch (e) { /* price stays empty */ }
  }
}

function say(m, who) {
  const div = document.createElement('div');
  div.className = 'msg ' + (who === 'me' ? 'me' : 'her');
  div.textContent = m;
  el('chatLog').appendChild(div);
  el('chatLog').scrollTop = el('chatLog').scrollHeight;
}

async function sendChat() {
  const text = el('chatInput').value;
  el('chatInput').value = '';
  if (!text.trim()) return;
  say('You: ' + text.trim(), 'me');
  try {
    const j = await call('/api/chat', { text });
    if (j.reply) say(j.reply, 'her');
    applyView(j.view);
  } catch (e) { say('Chenda: I couldn’t fetch data right now.', 'her'); }
}

function applySignals(p) {
  el('signals').innerHTML = p.html;
  el('signalsCount').textContent = p.count;
}

function connectSignals() {
  const proto = location.protocol === 'https:' ? 'wss://' : 'ws://';
  const ws = new WebSocket(proto + location.host + '/api/signals/ws');
  ws.onmessage = (ev) => { try { applySignals(JSON.parse(ev.data)); } catch (e) { console.error(e); } };
  ws.onclose = () => setTimeout(connectSignals, 3000);
}

document.addEventListener('DOMContentLoaded', () => {
  document.querySelectorAll('#tabs .tab-btn[data-tab]').forEach(b => {
    b.addEventListener('click', async () => {
      try { applyView(await call('/api/tab/' + b.dataset.tab)); } catch (e) { console.error(e); }
    });
  });
  el('refresh').addEventListener('click', async () => {
    el('refresh').disabled = true;
    try { applyView(await call('/api/refresh')); } catch (e) { console.error(e); }
    finally { el('refresh').disabled = false; }
  });
  el('search').addEventListener('input', async () => {
    try { applyView(await call('/api/filter', { q: el('search').value })); } catch (e) { console.error(e); }
  });
  el('usd').addEventListener('change', refreshPrices);
  document.querySelectorAll('#tabs-raw .tab-btn').forEach(b => {
    b.addEventListener('click', async () => {
      const url = '/api/raw/' + b.dataset.raw + (b.dataset.raw === 'books' ? '?symbol=XRP' : '');
      try { el('raw').innerHTML = (await (await fetch(url)).json()).html; } catch (e) { console.error(e); }
    });
  });
  el('sendBtn').addEventListener('click', sendChat);
  el('chatInput').addEventListener('keydown', e => { if (e.key === 'Enter') sendChat(); });

  loadView();
  fetch('/api/signals').then(r => r.json()).then(applySignals).catch(console.error);
  connectSignals();
  setInterval(loadView, 5000);
});
</script>
</body>
</html>
"####;
