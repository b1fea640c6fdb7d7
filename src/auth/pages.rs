// Minimal static forms; they post JSON to the API and show the reply.

pub const REGISTER: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Register</title></head>
<body>
<h1>Create an account</h1>
<form id="f">
  <input name="name" placeholder="Name" required>
  <input name="email" type="email" placeholder="Email" required>
  <input name="password" type="password" placeholder="Password" required>
  <input name="confirm_password" type="password" placeholder="Confirm password" required>
  <button>Register</button>
</form>
<p id="out"></p>
<script>
document.getElementById('f').onsubmit = async (e) => {
  e.preventDefault();
  const body = JSON.stringify(Object.fromEntries(new FormData(e.target)));
  const res = await fetch('/register', {method: 'POST', headers: {'Content-Type': 'application/json'}, body});
  const data = await res.json();
  document.getElementById('out').textContent = data.message;
  if (data.status === 'success') location.href = '/login';
};
</script>
</body>
</html>
"#;

pub const LOGIN: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Login</title></head>
<body>
<h1>Sign in</h1>
<form id="f">
  <input name="email" type="email" placeholder="Email" required>
  <input name="password" type="password" placeholder="Password" required>
  <button>Login</button>
</form>
<p id="out"></p>
<script>
document.getElementById('f').onsubmit = async (e) => {
  e.preventDefault();
  const body = JSON.stringify(Object.fromEntries(new FormData(e.target)));
  const res = await fetch('/login', {method: 'POST', headers: {'Content-Type': 'application/json'}, body});
  const data = await res.json();
  document.getElementById('out').textContent = data.message;
};
</script>
</body>
</html>
"#;
