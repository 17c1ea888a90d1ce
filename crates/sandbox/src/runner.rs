//! Source for the Python programs injected into sandbox containers.
//!
//! The runners themselves stay Python: they execute inside a `python:3.11-slim`
//! container, so there is no idiom to translate them into. What this module
//! owns is assembling that source from the session's tool list / limits the
//! way the host-side driver would, grounded on
//! `original_source/app/services/ptc/sandbox.py::_get_runner_script` and
//! `.../ptc/standalone_sandbox.py`'s embedded runner template.

use serde_json::Value;

use crate::protocol::{
    EXIT_SESSION, PTC_CODE_END, PTC_CODE_START, PTC_OUTPUT_END, PTC_OUTPUT_START, PTC_READY, PTC_TOOL_CALL_END,
    PTC_TOOL_CALL_START, PTC_TOOL_RESULT_END, PTC_TOOL_RESULT_START, STANDALONE_COMMAND_END,
    STANDALONE_COMMAND_START, STANDALONE_READY, STANDALONE_RESULT_END, STANDALONE_RESULT_START,
};

/// Builds the PTC runner script for a session's tool list. `loop_mode` mirrors
/// the reference session-reuse mode: when set the runner stays resident and
/// reads one code block after another until `__EXIT_SESSION__`.
pub fn ptc_runner_script(tools: &[Value], loop_mode: bool) -> String {
    let tools_json = serde_json::to_string(tools).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"#!/usr/bin/env python3
import sys, os, json, asyncio, uuid, threading, time, select

IPC_TOOL_CALL_START = "{PTC_TOOL_CALL_START}"
IPC_TOOL_CALL_END = "{PTC_TOOL_CALL_END}"
IPC_TOOL_RESULT_START = "{PTC_TOOL_RESULT_START}"
IPC_TOOL_RESULT_END = "{PTC_TOOL_RESULT_END}"
IPC_CODE_OUTPUT_START = "{PTC_OUTPUT_START}"
IPC_CODE_OUTPUT_END = "{PTC_OUTPUT_END}"

LOOP_MODE = {loop_mode}
EXIT_SIGNAL = "{EXIT_SESSION}"
READY_SIGNAL = "{PTC_READY}"

TOOLS_INFO = {tools_json}

_results = {{}}
_io_lock = threading.Lock()
_stdin_buffer = ""
_stdin_fd = None


def _get_stdin_fd():
    global _stdin_fd
    if _stdin_fd is None:
        _stdin_fd = sys.stdin.fileno()
    return _stdin_fd


def _read_and_buffer_data(timeout=0.1):
    global _stdin_buffer
    fd = _get_stdin_fd()
    try:
        readable, _, _ = select.select([fd], [], [], timeout)
        if not readable:
            return False
        chunk = os.read(fd, 65536)
        if not chunk:
            return False
        _stdin_buffer += chunk.decode("utf-8")
        return True
    except (OSError, ValueError):
        return False


def _process_tool_results():
    global _stdin_buffer
    while "\n" in _stdin_buffer:
        line, remaining = _stdin_buffer.split("\n", 1)
        if IPC_TOOL_RESULT_START in line and IPC_TOOL_RESULT_END in line:
            try:
                start = line.find(IPC_TOOL_RESULT_START) + len(IPC_TOOL_RESULT_START)
                end = line.find(IPC_TOOL_RESULT_END)
                result = json.loads(line[start:end])
                call_id = result.get("call_id")
                if call_id:
                    _results[call_id] = result
            except Exception:
                pass
            _stdin_buffer = remaining
        else:
            break


def _send_tool_call(tool_name, arguments):
    call_id = str(uuid.uuid4())
    request = {{"call_id": call_id, "tool_name": tool_name, "arguments": arguments}}
    print(f"{{IPC_TOOL_CALL_START}}{{json.dumps(request)}}{{IPC_TOOL_CALL_END}}", file=sys.stderr, flush=True)
    return call_id


def _receive_tool_result(call_id, timeout=300.0):
    start_time = time.time()
    while time.time() - start_time < timeout:
        with _io_lock:
            if call_id in _results:
                result = _results.pop(call_id)
                if result.get("error"):
                    raise RuntimeError(f"Tool error: {{result['error']}}")
                return result.get("result")
            _read_and_buffer_data(timeout=0.05)
            _process_tool_results()
            if call_id in _results:
                result = _results.pop(call_id)
                if result.get("error"):
                    raise RuntimeError(f"Tool error: {{result['error']}}")
                return result.get("result")
        time.sleep(0.01)
    raise TimeoutError(f"Timeout waiting for tool result: {{call_id}}")


def _create_tool_function(tool_name):
    async def tool_func(**kwargs):
        call_id = _send_tool_call(tool_name, kwargs)
        loop = asyncio.get_event_loop()
        return await loop.run_in_executor(None, lambda: _receive_tool_result(call_id))
    return tool_func


_tool_functions = {{info["name"]: _create_tool_function(info["name"]) for info in TOOLS_INFO}}


class OutputCapture:
    def __init__(self):
        self.outputs = []

    def write(self, text):
        if text.strip():
            self.outputs.append(text)

    def flush(self):
        pass

    def get_output(self):
        return "".join(self.outputs)


async def execute_user_code(code, exec_globals):
    for name, func in _tool_functions.items():
        exec_globals[name] = func
    output_capture = OutputCapture()
    exec_globals["print"] = lambda *args, **kwargs: output_capture.write(
        " ".join(str(a) for a in args) + kwargs.get("end", "\n")
    )
    indented = "\n".join("    " + line for line in code.split("\n"))
    wrapped = f"async def __user_main__():\n{{indented}}\n"
    try:
        exec(compile(wrapped, "<user_code>", "exec"), exec_globals)
        await exec_globals["__user_main__"]()
        exec_globals.pop("__user_main__", None)
        return {{"success": True, "output": output_capture.get_output(), "error": None}}
    except Exception as e:
        return {{"success": False, "output": output_capture.get_output(), "error": str(e)}}


def _read_line_unbuffered(timeout=None):
    global _stdin_buffer
    fd = _get_stdin_fd()
    start_time = time.time() if timeout else None
    while True:
        if start_time and timeout and time.time() - start_time > timeout:
            return None
        if "\n" in _stdin_buffer:
            line, _stdin_buffer = _stdin_buffer.split("\n", 1)
            return line
        try:
            select_timeout = 0.1
            if timeout:
                remaining = timeout - (time.time() - start_time)
                select_timeout = min(0.1, max(0, remaining))
            readable, _, _ = select.select([fd], [], [], select_timeout)
            if readable:
                chunk = os.read(fd, 65536)
                if not chunk:
                    if _stdin_buffer:
                        remaining_buf = _stdin_buffer
                        _stdin_buffer = ""
                        return remaining_buf
                    return None
                _stdin_buffer += chunk.decode("utf-8")
        except (OSError, ValueError):
            return None


def read_code_block():
    code_lines = []
    reading = False
    with _io_lock:
        while True:
            line = _read_line_unbuffered(timeout=300.0)
            if line is None or line == EXIT_SIGNAL:
                return None
            if line == "__CODE_START__":
                reading = True
                continue
            if line == "__CODE_END__":
                break
            if reading:
                code_lines.append(line)
    return "\n".join(code_lines) if code_lines else ""


def run_one(exec_globals):
    code = read_code_block()
    if code is None:
        return False
    if not code:
        print(f"{{IPC_CODE_OUTPUT_START}}{{json.dumps({{'success': False, 'output': '', 'error': 'No code provided'}})}}{{IPC_CODE_OUTPUT_END}}", flush=True)
        return True
    try:
        result = asyncio.run(execute_user_code(code, exec_globals))
    except Exception as e:
        result = {{"success": False, "output": "", "error": str(e)}}
    print(f"{{IPC_CODE_OUTPUT_START}}{{json.dumps(result)}}{{IPC_CODE_OUTPUT_END}}", flush=True)
    return True


def main():
    exec_globals = {{"__builtins__": __builtins__, "asyncio": asyncio, "json": json}}
    if LOOP_MODE:
        print(READY_SIGNAL, file=sys.stderr, flush=True)
        while run_one(exec_globals):
            pass
    else:
        run_one(exec_globals)


if __name__ == "__main__":
    main()
"#
    )
}

/// Builds the standalone runner script: a bash + restricted text-editor
/// command dispatcher with no tool-call suspension, one command per request.
pub fn standalone_runner_script(workspace_dir: &str, bash_timeout_seconds: u64, max_file_size_bytes: u64) -> String {
    format!(
        r#"#!/usr/bin/env python3
import sys, os, json, subprocess, select, difflib

IPC_COMMAND_START = "{STANDALONE_COMMAND_START}"
IPC_COMMAND_END = "{STANDALONE_COMMAND_END}"
IPC_RESULT_START = "{STANDALONE_RESULT_START}"
IPC_RESULT_END = "{STANDALONE_RESULT_END}"
READY_SIGNAL = "{STANDALONE_READY}"
EXIT_SIGNAL = "{EXIT_SESSION}"

WORKSPACE_DIR = "{workspace_dir}"
BASH_TIMEOUT = {bash_timeout_seconds}
MAX_FILE_SIZE = {max_file_size_bytes}


def send_result(result):
    print(f"{{IPC_RESULT_START}}{{json.dumps(result)}}{{IPC_RESULT_END}}", flush=True)


def execute_bash(command):
    try:
        result = subprocess.run(
            command, shell=True, capture_output=True, text=True,
            timeout=BASH_TIMEOUT, cwd=WORKSPACE_DIR, env={{**os.environ, "HOME": WORKSPACE_DIR}},
        )
        return {{"type": "bash_code_execution_result", "stdout": result.stdout, "stderr": result.stderr, "return_code": result.returncode}}
    except subprocess.TimeoutExpired:
        return {{"type": "bash_code_execution_result", "stdout": "", "stderr": f"Command timed out after {{BASH_TIMEOUT}} seconds", "return_code": 124}}
    except Exception as e:
        return {{"type": "bash_code_execution_result", "stdout": "", "stderr": str(e), "return_code": 1}}


def _resolve(path):
    full_path = path if os.path.isabs(path) else os.path.join(WORKSPACE_DIR, path)
    real_path = os.path.realpath(full_path)
    workspace_real = os.path.realpath(WORKSPACE_DIR)
    if not (real_path == workspace_real or real_path.startswith(workspace_real + os.sep)):
        return None
    return full_path


def execute_text_editor(command, path, **kwargs):
    full_path = _resolve(path)
    if full_path is None:
        return {{"type": "text_editor_code_execution_result", "error_code": "invalid_tool_input", "error_message": f"Path must be within workspace: {{path}}"}}
    if command == "view":
        return _view_file(full_path, kwargs.get("view_range"))
    if command == "create":
        return _create_file(full_path, kwargs.get("file_text", ""))
    if command == "str_replace":
        return _str_replace_file(full_path, kwargs.get("old_str", ""), kwargs.get("new_str", ""))
    return {{"type": "text_editor_code_execution_result", "error_code": "invalid_tool_input", "error_message": f"Unknown command: {{command}}"}}


def _view_file(path, view_range=None):
    if not os.path.exists(path):
        return {{"type": "text_editor_code_execution_result", "error_code": "file_not_found", "error_message": f"File not found: {{path}}"}}
    try:
        if os.path.getsize(path) > MAX_FILE_SIZE:
            return {{"type": "text_editor_code_execution_result", "error_code": "invalid_tool_input", "error_message": "File too large"}}
        with open(path, "r", encoding="utf-8", errors="replace") as f:
            lines = f.readlines()
        total = len(lines)
        start, end = 1, total
        if view_range and len(view_range) >= 2:
            start, end = max(1, view_range[0]), min(total, view_range[1])
        selected = lines[start - 1:end]
        return {{"type": "text_editor_code_execution_result", "file_type": "text", "content": "".join(selected), "numLines": len(selected), "startLine": start, "totalLines": total}}
    except Exception as e:
        return {{"type": "text_editor_code_execution_result", "error_code": "unavailable", "error_message": str(e)}}


def _create_file(path, file_text):
    try:
        parent = os.path.dirname(path)
        if parent and not os.path.exists(parent):
            os.makedirs(parent, exist_ok=True)
        existed = os.path.exists(path)
        with open(path, "w", encoding="utf-8") as f:
            f.write(file_text)
        return {{"type": "text_editor_code_execution_result", "is_file_update": existed}}
    except Exception as e:
        return {{"type": "text_editor_code_execution_result", "error_code": "unavailable", "error_message": str(e)}}


def _str_replace_file(path, old_str, new_str):
    if not os.path.exists(path):
        return {{"type": "text_editor_code_execution_result", "error_code": "file_not_found", "error_message": f"File not found: {{path}}"}}
    try:
        with open(path, "r", encoding="utf-8") as f:
            original = f.read()
        if old_str not in original:
            return {{"type": "text_editor_code_execution_result", "error_code": "string_not_found", "error_message": "String not found in file"}}
        new_content = original.replace(old_str, new_str, 1)
        with open(path, "w", encoding="utf-8") as f:
            f.write(new_content)
        diff_lines = [f"- {{line}}" for line in old_str.splitlines()] + [f"+ {{line}}" for line in new_str.splitlines()]
        return {{"type": "text_editor_code_execution_result", "oldLines": old_str.count(chr(10)) + 1, "newLines": new_str.count(chr(10)) + 1, "lines": diff_lines}}
    except Exception as e:
        return {{"type": "text_editor_code_execution_result", "error_code": "unavailable", "error_message": str(e)}}


def read_command():
    fd = sys.stdin.fileno()
    buffer = ""
    while True:
        readable, _, _ = select.select([fd], [], [], 300.0)
        if not readable:
            return None
        chunk = os.read(fd, 65536)
        if not chunk:
            return None
        buffer += chunk.decode("utf-8")
        while "\n" in buffer:
            line, buffer = buffer.split("\n", 1)
            if line == EXIT_SIGNAL:
                return None
            if IPC_COMMAND_START in line and IPC_COMMAND_END in line:
                start = line.find(IPC_COMMAND_START) + len(IPC_COMMAND_START)
                end = line.find(IPC_COMMAND_END)
                return json.loads(line[start:end])


def main():
    print(READY_SIGNAL, file=sys.stderr, flush=True)
    while True:
        command = read_command()
        if command is None:
            break
        kind = command.get("type")
        payload = command.get("input", {{}})
        if kind == "bash_code_execution":
            send_result(execute_bash(payload.get("command", "")))
        elif kind == "text_editor_code_execution":
            send_result(execute_text_editor(payload.get("command"), payload.get("path", ""), **{{k: v for k, v in payload.items() if k not in ("command", "path")}}))
        else:
            send_result({{"type": "error", "error_message": f"Unknown command type: {{kind}}"}})


if __name__ == "__main__":
    main()
"#
    )
}
